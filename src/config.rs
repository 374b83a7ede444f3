//! Environment-sourced configuration for embedding applications.
//!
//! A convenience constructor only: [`Verifier`](crate::verifier::Verifier)
//! and [`LinkBuilder`](crate::issuer::LinkBuilder) never read the
//! environment themselves and remain pure functions of their explicit
//! arguments.

use std::env;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use thiserror::Error;

use crate::key::{Key, KeySet};

const DEFAULT_KEY_ID: &str = "default";
const DEFAULT_TTL_SECONDS: i64 = 900;
const DEFAULT_MAX_CLOCK_SKEW_SECONDS: i64 = 120;
const DEFAULT_QUERY_PARAM: &str = "ml";
const GENERATED_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MAGIC_LINK_SIGNING_KEY is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("MAGIC_LINK_SIGNING_KEY decoded to an unusable secret: {0}")]
    InvalidKey(#[from] crate::error::CryptoError),
    #[error("MAGIC_LINK_DEFAULT_TTL_SECONDS must be a positive integer")]
    InvalidTtl,
    #[error("MAGIC_LINK_MAX_CLOCK_SKEW_SECONDS must be a non-negative integer")]
    InvalidClockSkew,
}

/// Environment-derived settings for an embedding application: a single
/// ad hoc signing key plus default policy values. See the crate's
/// environment-variable reference for the variable names and defaults.
#[derive(Debug, Clone)]
pub struct MagicLinkConfig {
    pub keys: KeySet,
    pub key_id: String,
    pub default_ttl_seconds: i64,
    pub max_clock_skew_seconds: i64,
    pub query_param: String,
}

impl MagicLinkConfig {
    /// Loads configuration from environment variables, never panicking on
    /// malformed input. If `MAGIC_LINK_SIGNING_KEY` is unset, a fresh random
    /// key is generated — convenient for local development, not suitable
    /// for a multi-instance deployment where every instance must agree on
    /// the key.
    pub fn from_env() -> Result<Self, ConfigError> {
        let key_id = env::var("MAGIC_LINK_KEY_ID").unwrap_or_else(|_| DEFAULT_KEY_ID.to_string());

        let secret = match env::var("MAGIC_LINK_SIGNING_KEY") {
            Ok(value) => STANDARD.decode(value)?,
            Err(_) => {
                let mut bytes = vec![0u8; GENERATED_SECRET_LEN];
                rand::thread_rng().fill_bytes(&mut bytes);
                bytes
            }
        };

        let default_ttl_seconds = match env::var("MAGIC_LINK_DEFAULT_TTL_SECONDS") {
            Ok(value) => value
                .parse::<i64>()
                .ok()
                .filter(|&v| v > 0)
                .ok_or(ConfigError::InvalidTtl)?,
            Err(_) => DEFAULT_TTL_SECONDS,
        };

        let max_clock_skew_seconds = match env::var("MAGIC_LINK_MAX_CLOCK_SKEW_SECONDS") {
            Ok(value) => value
                .parse::<i64>()
                .ok()
                .filter(|&v| v >= 0)
                .ok_or(ConfigError::InvalidClockSkew)?,
            Err(_) => DEFAULT_MAX_CLOCK_SKEW_SECONDS,
        };

        let query_param =
            env::var("MAGIC_LINK_QUERY_PARAM").unwrap_or_else(|_| DEFAULT_QUERY_PARAM.to_string());

        let mut keys = KeySet::new();
        keys.add(Key::new(key_id.clone(), secret, 1, None)?);

        Ok(Self {
            keys,
            key_id,
            default_ttl_seconds,
            max_clock_skew_seconds,
            query_param,
        })
    }
}
