//! Verifies magic-link tokens through a strict, single-failure-reason
//! pipeline: parse, crypto, time, context, then replay.

use serde_json::Value;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use url::Url;

use crate::cipher::{AeadEnvelope, Cipher};
use crate::claims::{app_keys, Claims, EncryptedEnvelope, Header, Token, ALG_HS256, ENC_A256GCM};
use crate::clock::Clock;
use crate::encoding::{base64url_decode, base64url_encode, json_decode_object};
use crate::key::KeySet;
use crate::mac::MacSigner;
use crate::nonce::NonceStore;

/// Default tolerance, in seconds, applied to `iat`, `nbf`, and `exp`.
pub const DEFAULT_MAX_CLOCK_SKEW: i64 = 120;

/// Every verification failure funnels to exactly one of these reasons.
/// Hostile input never raises: a malformed or forged token always produces
/// one of these, never a panic or an error of a different type.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    #[error("token does not have three dot-separated segments")]
    MalformedToken,
    #[error("token header is malformed")]
    MalformedHeader,
    #[error("token payload is malformed")]
    MalformedPayload,
    #[error("no key with the given id is known")]
    UnknownKid,
    #[error("signature does not match")]
    SignatureMismatch,
    #[error("payload is encrypted but no AEAD cipher is available")]
    EncryptionUnavailable,
    #[error("AEAD decryption failed")]
    DecryptFailed,
    #[error("token has expired")]
    TokenExpired,
    #[error("token is not yet valid")]
    TokenEarly,
    #[error("issued-at time is beyond tolerated clock skew")]
    ClockSkew,
    #[error("audience does not match")]
    AudMismatch,
    #[error("path does not match")]
    PathMismatch,
    #[error("host does not match")]
    HostMismatch,
    #[error("user-agent hash does not match")]
    UaMismatch,
    #[error("token has already been used")]
    Replayed,
    #[error("a one-time token was required")]
    OneTimeRequired,
    #[error("return URL was rejected by the allowlist")]
    ReturnToDenied,
}

/// Caller-supplied verification policy.
#[derive(Default)]
pub struct VerifyOptions<'a> {
    pub expected_aud: Option<String>,
    pub expected_path: Option<String>,
    pub expected_host: Option<String>,
    pub require_one_time: bool,
    pub max_clock_skew: Option<i64>,
    pub enforce_ua_hash: bool,
    pub return_to_allowlist: Option<&'a (dyn Fn(&str) -> bool + Send + Sync)>,
}

/// Request-derived context the verifier binds against. All fields are
/// supplied by the caller's transport layer, never parsed by the core
/// beyond what [`Verifier::verify_from_request`] extracts from a URL string.
#[derive(Debug, Default, Clone)]
pub struct RequestContext {
    pub path: Option<String>,
    pub host: Option<String>,
    pub user_agent: Option<String>,
}

/// Verifies tokens against a [`KeySet`], a [`Clock`], and a [`NonceStore`].
pub struct Verifier<'a, C: Clock, N: NonceStore> {
    keys: &'a KeySet,
    clock: &'a C,
    nonce_store: &'a N,
    mac: MacSigner,
    cipher: Cipher,
}

impl<'a, C: Clock, N: NonceStore> Verifier<'a, C, N> {
    pub fn new(keys: &'a KeySet, clock: &'a C, nonce_store: &'a N) -> Self {
        Self {
            keys,
            clock,
            nonce_store,
            mac: MacSigner::new(),
            cipher: Cipher::new(),
        }
    }

    /// Runs the full verification pipeline against a raw token string.
    pub fn verify(
        &self,
        token: &str,
        options: &VerifyOptions,
        context: &RequestContext,
    ) -> Result<Claims, Reason> {
        let token = split_token(token)?;

        let header_bytes =
            base64url_decode(&token.header_segment).map_err(|_| Reason::MalformedToken)?;
        let payload_bytes_raw =
            base64url_decode(&token.payload_segment).map_err(|_| Reason::MalformedToken)?;
        let signature =
            base64url_decode(&token.signature_segment).map_err(|_| Reason::MalformedToken)?;

        let header: Header =
            serde_json::from_slice(&header_bytes).map_err(|_| Reason::MalformedHeader)?;
        if header.alg != ALG_HS256 || header.kid.is_empty() {
            return Err(Reason::MalformedHeader);
        }

        let key = self.keys.find(&header.kid).ok_or(Reason::UnknownKid)?;

        if !self
            .mac
            .verify(key, token.signing_input().as_bytes(), &signature)
        {
            return Err(Reason::SignatureMismatch);
        }

        let claims_bytes = match &header.enc {
            None => payload_bytes_raw,
            Some(enc) => {
                if enc != ENC_A256GCM {
                    return Err(Reason::MalformedHeader);
                }
                if !Cipher::is_available() {
                    return Err(Reason::EncryptionUnavailable);
                }
                let envelope_map =
                    json_decode_object(&payload_bytes_raw).map_err(|_| Reason::MalformedPayload)?;
                let envelope: EncryptedEnvelope =
                    serde_json::from_value(Value::Object(envelope_map))
                        .map_err(|_| Reason::MalformedPayload)?;
                let aead = AeadEnvelope {
                    iv: base64url_decode(&envelope.iv).map_err(|_| Reason::MalformedPayload)?,
                    tag: base64url_decode(&envelope.tag).map_err(|_| Reason::MalformedPayload)?,
                    ct: base64url_decode(&envelope.ct).map_err(|_| Reason::MalformedPayload)?,
                };
                self.cipher
                    .decrypt(key, token.header_segment.as_bytes(), &aead)
                    .map_err(|_| {
                        tracing::warn!(kid = %header.kid, "AEAD decrypt failed during verify");
                        Reason::DecryptFailed
                    })?
            }
        };

        let claims: Claims =
            serde_json::from_slice(&claims_bytes).map_err(|_| Reason::MalformedPayload)?;
        if claims.sub.is_empty() {
            return Err(Reason::MalformedPayload);
        }

        let now = self.clock.now();
        let skew = options.max_clock_skew.unwrap_or(DEFAULT_MAX_CLOCK_SKEW).max(0);
        if claims.iat > now + skew {
            return Err(Reason::ClockSkew);
        }
        if let Some(nbf) = claims.nbf {
            if nbf > now + skew {
                return Err(Reason::TokenEarly);
            }
        }
        if claims.exp < now - skew {
            return Err(Reason::TokenExpired);
        }

        if let Some(expected) = &options.expected_aud {
            if claims.aud.as_deref() != Some(expected.as_str()) {
                return Err(Reason::AudMismatch);
            }
        }

        if let Some(expected) = &options.expected_path {
            let actual = context.path.as_deref().ok_or(Reason::PathMismatch)?;
            if !path_matches(expected, actual) {
                return Err(Reason::PathMismatch);
            }
        }
        if let Some(bound) = claims.get_app_str(app_keys::BIND_PATH) {
            let actual = context.path.as_deref().ok_or(Reason::PathMismatch)?;
            if !path_matches(bound, actual) {
                return Err(Reason::PathMismatch);
            }
        }

        if let Some(expected) = &options.expected_host {
            let actual = context.host.as_deref().ok_or(Reason::HostMismatch)?;
            if !const_eq(expected, actual) {
                return Err(Reason::HostMismatch);
            }
        }
        if let Some(bound) = claims.get_app_str(app_keys::BIND_HOST) {
            let actual = context.host.as_deref().ok_or(Reason::HostMismatch)?;
            if !const_eq(bound, actual) {
                return Err(Reason::HostMismatch);
            }
        }

        if options.enforce_ua_hash {
            let expected_hash = claims
                .get_app_str(app_keys::UA_HASH)
                .ok_or(Reason::UaMismatch)?;
            let user_agent = context.user_agent.as_deref().ok_or(Reason::UaMismatch)?;
            let actual_hash = base64url_encode(Sha256::digest(user_agent.as_bytes()));
            if !const_eq(expected_hash, &actual_hash) {
                return Err(Reason::UaMismatch);
            }
        }

        if options.require_one_time && claims.jti.is_none() {
            return Err(Reason::OneTimeRequired);
        }

        if let Some(return_to) = claims.get_app_str(app_keys::RETURN_TO) {
            if let Some(allowlist) = options.return_to_allowlist {
                if !allowlist(return_to) {
                    return Err(Reason::ReturnToDenied);
                }
            }
        }

        if let Some(jti) = &claims.jti {
            if !self.nonce_store.consume(jti, claims.exp) {
                tracing::warn!(kid = %header.kid, "rejected replayed token");
                return Err(Reason::Replayed);
            }
        }

        tracing::debug!(sub = %claims.sub, kid = %header.kid, "token verified");
        Ok(claims)
    }

    /// Ingests a raw token string or a URL carrying one under `param_name`
    /// (typically `"ml"`). When the URL's query lacks the parameter, falls
    /// back to treating the whole input as a raw token.
    pub fn verify_from_request(
        &self,
        input: &str,
        param_name: &str,
        options: &VerifyOptions,
        mut context: RequestContext,
    ) -> Result<Claims, Reason> {
        if input.contains("://") {
            let url = Url::parse(input).map_err(|_| Reason::MalformedToken)?;
            let token = url
                .query_pairs()
                .find(|(key, _)| key == param_name)
                .map(|(_, value)| value.into_owned());
            context.path.get_or_insert_with(|| url.path().to_string());
            context
                .host
                .get_or_insert_with(|| url.host_str().map(str::to_string).unwrap_or_default());
            match token {
                Some(token) => self.verify(&token, options, &context),
                None => self.verify(input, options, &context),
            }
        } else {
            self.verify(input, options, &context)
        }
    }
}

fn split_token(token: &str) -> Result<Token, Reason> {
    let mut parts = token.split('.');
    let header_segment = parts.next().ok_or(Reason::MalformedToken)?.to_string();
    let payload_segment = parts.next().ok_or(Reason::MalformedToken)?.to_string();
    let signature_segment = parts.next().ok_or(Reason::MalformedToken)?.to_string();
    if parts.next().is_some() {
        return Err(Reason::MalformedToken);
    }
    Ok(Token {
        header_segment,
        payload_segment,
        signature_segment,
    })
}

/// `""` matches only `""`; a trailing `*` is a literal-prefix match; anything
/// else is an exact, constant-time comparison.
fn path_matches(expected: &str, actual: &str) -> bool {
    if expected.is_empty() {
        return actual.is_empty();
    }
    if let Some(prefix) = expected.strip_suffix('*') {
        return actual.len() >= prefix.len() && const_eq(prefix, &actual[..prefix.len()]);
    }
    const_eq(expected, actual)
}

fn const_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
