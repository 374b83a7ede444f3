//! Optional AES-256-GCM payload encryption.
//!
//! Gated behind the `aead` Cargo feature. When the feature is off,
//! [`Cipher::is_available`] reports `false` and every operation fails
//! closed with [`CryptoError::CipherUnavailable`] rather than panicking or
//! silently skipping encryption.

use crate::error::CryptoError;
use crate::key::{Key, MIN_AEAD_SECRET_LEN};

/// The three Base64url-encoded fields of an AEAD envelope, matching the
/// wire payload `{iv, tag, ct}`.
#[derive(Debug, Clone)]
pub struct AeadEnvelope {
    pub iv: Vec<u8>,
    pub tag: Vec<u8>,
    pub ct: Vec<u8>,
}

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Stateless AES-256-GCM cipher. The key's secret is truncated to its first
/// 32 bytes when longer.
#[derive(Debug, Default, Clone, Copy)]
pub struct Cipher;

impl Cipher {
    pub fn new() -> Self {
        Self
    }

    /// True when this build was compiled with the `aead` feature enabled.
    pub const fn is_available() -> bool {
        cfg!(feature = "aead")
    }

    #[cfg(feature = "aead")]
    fn gcm(key: &Key) -> Result<aes_gcm::Aes256Gcm, CryptoError> {
        use aes_gcm::{aead::KeyInit, Aes256Gcm};
        if !key.usable_for_aead() {
            return Err(CryptoError::SecretTooShort {
                kid: key.kid().to_string(),
                min: MIN_AEAD_SECRET_LEN,
                got: key.secret().len(),
            });
        }
        let secret = &key.secret()[..MIN_AEAD_SECRET_LEN];
        Aes256Gcm::new_from_slice(secret).map_err(|_| CryptoError::EncryptionFailed)
    }

    /// Encrypts `plaintext` under `key`, binding `aad` (the encoded header
    /// segment) to the ciphertext.
    #[cfg(feature = "aead")]
    pub fn encrypt(
        &self,
        key: &Key,
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<AeadEnvelope, CryptoError> {
        use aes_gcm::aead::{Aead, OsRng, Payload};
        use aes_gcm::Nonce;
        use rand::RngCore;

        let cipher = Self::gcm(key)?;
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);
        let sealed = cipher
            .encrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| CryptoError::EncryptionFailed)?;
        let split_at = sealed.len().saturating_sub(TAG_LEN);
        let (ct, tag) = sealed.split_at(split_at);
        Ok(AeadEnvelope {
            iv: iv.to_vec(),
            tag: tag.to_vec(),
            ct: ct.to_vec(),
        })
    }

    #[cfg(not(feature = "aead"))]
    pub fn encrypt(
        &self,
        _key: &Key,
        _aad: &[u8],
        _plaintext: &[u8],
    ) -> Result<AeadEnvelope, CryptoError> {
        Err(CryptoError::CipherUnavailable)
    }

    /// Decrypts `envelope` under `key`, verifying `aad` against the tag.
    #[cfg(feature = "aead")]
    pub fn decrypt(&self, key: &Key, aad: &[u8], envelope: &AeadEnvelope) -> Result<Vec<u8>, CryptoError> {
        use aes_gcm::aead::{Aead, Payload};
        use aes_gcm::Nonce;

        if envelope.iv.len() != IV_LEN || envelope.tag.len() != TAG_LEN {
            return Err(CryptoError::DecryptionFailed);
        }
        let cipher = Self::gcm(key)?;
        let mut sealed = Vec::with_capacity(envelope.ct.len() + envelope.tag.len());
        sealed.extend_from_slice(&envelope.ct);
        sealed.extend_from_slice(&envelope.tag);
        cipher
            .decrypt(
                Nonce::from_slice(&envelope.iv),
                Payload {
                    msg: &sealed,
                    aad,
                },
            )
            .map_err(|_| CryptoError::DecryptionFailed)
    }

    #[cfg(not(feature = "aead"))]
    pub fn decrypt(
        &self,
        _key: &Key,
        _aad: &[u8],
        _envelope: &AeadEnvelope,
    ) -> Result<Vec<u8>, CryptoError> {
        Err(CryptoError::CipherUnavailable)
    }
}

#[cfg(all(test, feature = "aead"))]
mod tests {
    use super::*;

    fn key() -> Key {
        Key::new("k", vec![11u8; 32], 1, None).unwrap()
    }

    #[test]
    fn round_trips() {
        let cipher = Cipher::new();
        let key = key();
        let envelope = cipher.encrypt(&key, b"header-segment", b"hello claims").unwrap();
        let plaintext = cipher.decrypt(&key, b"header-segment", &envelope).unwrap();
        assert_eq!(plaintext, b"hello claims");
    }

    #[test]
    fn rejects_tampered_aad() {
        let cipher = Cipher::new();
        let key = key();
        let envelope = cipher.encrypt(&key, b"header-a", b"hello").unwrap();
        assert!(cipher.decrypt(&key, b"header-b", &envelope).is_err());
    }

    #[test]
    fn rejects_tampered_ciphertext() {
        let cipher = Cipher::new();
        let key = key();
        let mut envelope = cipher.encrypt(&key, b"aad", b"hello").unwrap();
        envelope.ct[0] ^= 0xFF;
        assert!(cipher.decrypt(&key, b"aad", &envelope).is_err());
    }

    #[test]
    fn rejects_secret_too_short_for_aead() {
        let cipher = Cipher::new();
        let short_key = Key::new("short", vec![1u8; 16], 1, None).unwrap();
        assert!(cipher.encrypt(&short_key, b"aad", b"hello").is_err());
    }

    #[test]
    fn is_available_true_with_feature_enabled() {
        assert!(Cipher::is_available());
    }
}
