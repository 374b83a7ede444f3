//! Key material and key rotation.

use std::collections::HashMap;

use crate::error::CryptoError;

/// Minimum secret length for HMAC-SHA-256 signing.
pub const MIN_SECRET_LEN: usize = 16;
/// Minimum secret length required before a key may be used for AEAD.
pub const MIN_AEAD_SECRET_LEN: usize = 32;

/// Immutable key material: an identifier, raw secret bytes, and an optional
/// validity window for signing.
#[derive(Clone)]
pub struct Key {
    kid: String,
    secret: Vec<u8>,
    created_at: i64,
    expires_at: Option<i64>,
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Key")
            .field("kid", &self.kid)
            .field("secret", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Key {
    /// Builds a key, validating `kid`, `created_at`, and the secret length.
    pub fn new(
        kid: impl Into<String>,
        secret: impl Into<Vec<u8>>,
        created_at: i64,
        expires_at: Option<i64>,
    ) -> Result<Self, CryptoError> {
        let kid = kid.into();
        let secret = secret.into();
        if kid.is_empty() {
            return Err(CryptoError::EmptyKeyId);
        }
        if created_at <= 0 {
            return Err(CryptoError::InvalidCreatedAt);
        }
        if secret.len() < MIN_SECRET_LEN {
            return Err(CryptoError::SecretTooShort {
                kid,
                min: MIN_SECRET_LEN,
                got: secret.len(),
            });
        }
        Ok(Self {
            kid,
            secret,
            created_at,
            expires_at,
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.expires_at
    }

    /// A key is eligible for *new* signatures at `now` when it has no expiry
    /// or has not yet expired.
    pub fn usable_for_signing(&self, now: i64) -> bool {
        self.expires_at.map(|exp| exp >= now).unwrap_or(true)
    }

    /// True if the secret is long enough to be used with AEAD.
    pub fn usable_for_aead(&self) -> bool {
        self.secret.len() >= MIN_AEAD_SECRET_LEN
    }
}

/// A mapping from `kid` to [`Key`]. Never implicitly purges; verification
/// may look up an expired key so that tokens issued before a rotation still
/// verify until their own `exp`.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: HashMap<String, Key>,
}

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the key under its `kid`.
    pub fn add(&mut self, key: Key) {
        self.keys.insert(key.kid().to_string(), key);
    }

    /// Looks up a key by id, expired or not.
    pub fn find(&self, kid: &str) -> Option<&Key> {
        self.keys.get(kid)
    }

    /// Picks the signing key with the greatest `created_at` among those
    /// unexpired at `now`. Ties are broken by `kid` ordering so the choice
    /// never depends on insertion or hash-map iteration order.
    pub fn get_for_sign(&self, now: i64) -> Result<&Key, CryptoError> {
        self.keys
            .values()
            .filter(|key| key.usable_for_signing(now))
            .max_by(|a, b| {
                a.created_at()
                    .cmp(&b.created_at())
                    .then_with(|| a.kid().cmp(b.kid()))
            })
            .ok_or(CryptoError::NoSigningKey)
    }
}
