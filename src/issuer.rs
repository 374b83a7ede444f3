//! Issues magic-link tokens and assembles their URLs.

use rand::RngCore;
use serde_json::{Map, Value};
use url::Url;

use crate::cipher::{AeadEnvelope, Cipher};
use crate::claims::{app_keys, Claims, EncryptedEnvelope, Header, ALG_HS256, ENC_A256GCM};
use crate::clock::Clock;
use crate::encoding::{base64url_decode, base64url_encode, canonical_json};
use crate::error::{CryptoError, InvalidFormat, IssueError};
use crate::key::KeySet;
use crate::mac::MacSigner;

/// Default token lifetime when [`CreateOptions::ttl_seconds`] is unset.
pub const DEFAULT_TTL_SECONDS: i64 = 900;
/// Default URL query parameter name carrying the token.
pub const DEFAULT_QUERY_PARAM: &str = "ml";

/// Caller-supplied fields for [`LinkBuilder::issue`].
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub aud: Option<String>,
    pub ttl_seconds: Option<i64>,
    pub one_time: bool,
    pub encrypt_payload: bool,
    pub path_bind: Option<String>,
    pub return_to: Option<String>,
    pub app: Map<String, Value>,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            aud: None,
            ttl_seconds: None,
            one_time: true,
            encrypt_payload: false,
            path_bind: None,
            return_to: None,
            app: Map::new(),
        }
    }
}

/// Issues tokens against a [`KeySet`] and a [`Clock`].
pub struct LinkBuilder<'a, C: Clock> {
    keys: &'a KeySet,
    clock: &'a C,
    mac: MacSigner,
    cipher: Cipher,
}

impl<'a, C: Clock> LinkBuilder<'a, C> {
    pub fn new(keys: &'a KeySet, clock: &'a C) -> Self {
        Self {
            keys,
            clock,
            mac: MacSigner::new(),
            cipher: Cipher::new(),
        }
    }

    /// Builds a signed (and optionally encrypted) token for `subject`.
    pub fn issue(&self, subject: &str, options: &CreateOptions) -> Result<String, IssueError> {
        let now = self.clock.now();
        let key = self.keys.get_for_sign(now).map_err(|err| {
            tracing::warn!("no usable signing key at issue time: {err}");
            IssueError::Crypto(err)
        })?;

        let ttl = options.ttl_seconds.unwrap_or(DEFAULT_TTL_SECONDS).max(1);
        let exp = now + ttl;

        let jti = if options.one_time {
            let mut bytes = [0u8; 16];
            rand::thread_rng().fill_bytes(&mut bytes);
            Some(base64url_encode(bytes))
        } else {
            None
        };

        let mut app = options.app.clone();
        if let Some(path) = &options.path_bind {
            app.insert(app_keys::BIND_PATH.to_string(), Value::String(path.clone()));
        }
        if let Some(return_to) = &options.return_to {
            app.insert(
                app_keys::RETURN_TO.to_string(),
                Value::String(return_to.clone()),
            );
        }

        let claims = Claims {
            sub: subject.to_string(),
            iat: now,
            exp,
            aud: options.aud.clone(),
            nbf: None,
            jti,
            app,
        };

        let mut header = Header {
            alg: ALG_HS256.to_string(),
            kid: key.kid().to_string(),
            enc: None,
        };
        if options.encrypt_payload {
            if !Cipher::is_available() {
                return Err(IssueError::Crypto(CryptoError::CipherUnavailable));
            }
            header.enc = Some(ENC_A256GCM.to_string());
        }
        let header_value = serde_json::to_value(&header).expect("Header always serializes");
        let header_json = canonical_json(&header_value).map_err(IssueError::Format)?;
        let header_segment = base64url_encode(header_json.as_bytes());

        let claims_value = serde_json::to_value(&claims).expect("Claims always serializes");
        let payload_json = canonical_json(&claims_value).map_err(IssueError::Format)?;

        let payload_segment = if options.encrypt_payload {
            let AeadEnvelope { iv, tag, ct } = self
                .cipher
                .encrypt(key, header_segment.as_bytes(), payload_json.as_bytes())
                .map_err(IssueError::Crypto)?;
            let envelope = EncryptedEnvelope {
                iv: base64url_encode(iv),
                tag: base64url_encode(tag),
                ct: base64url_encode(ct),
            };
            let envelope_value =
                serde_json::to_value(&envelope).expect("EncryptedEnvelope always serializes");
            let envelope_json = canonical_json(&envelope_value).map_err(IssueError::Format)?;
            base64url_encode(envelope_json.as_bytes())
        } else {
            base64url_encode(payload_json.as_bytes())
        };

        let signing_input = format!("{header_segment}.{payload_segment}");
        let signature = self.mac.sign(key, signing_input.as_bytes());
        let signature_segment = base64url_encode(signature);

        Ok(format!(
            "{header_segment}.{payload_segment}.{signature_segment}"
        ))
    }

    /// Merges `token` into `base_url`'s query string under `param_name`,
    /// preserving scheme, userinfo, host, port, path, and fragment.
    pub fn create_url(base_url: &str, token: &str, param_name: &str) -> Result<String, InvalidFormat> {
        let mut url = Url::parse(base_url).map_err(|err| InvalidFormat::Url(err.to_string()))?;
        let existing: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != param_name)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            for (key, value) in &existing {
                pairs.append_pair(key, value);
            }
            pairs.append_pair(param_name, token);
        }
        Ok(url.into())
    }
}
