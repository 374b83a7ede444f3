//! The claims payload and the three-segment token container.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved `app` claim keys the verifier inspects by convention. There is
/// no schema beyond presence-and-type checks at these keys.
pub mod app_keys {
    pub const BIND_PATH: &str = "bind.path";
    pub const BIND_HOST: &str = "bind.host";
    pub const UA_HASH: &str = "uah";
    pub const RETURN_TO: &str = "return_to";
}

/// The magic-link claims object: subject, timing bounds, optional audience
/// and request-context bindings, and a caller-defined claim bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub app: Map<String, Value>,
}

impl Claims {
    pub fn get_app_str(&self, key: &str) -> Option<&str> {
        self.app.get(key).and_then(Value::as_str)
    }
}

/// JWT-like header. `alg` is always `"HS256"`; `enc` is present only when
/// the payload is an AEAD envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub alg: String,
    pub kid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enc: Option<String>,
}

pub const ALG_HS256: &str = "HS256";
pub const ENC_A256GCM: &str = "A256GCM";

/// A parsed, not-yet-validated token: its three Base64url segments plus the
/// already-decoded header.
#[derive(Debug, Clone)]
pub struct Token {
    pub header_segment: String,
    pub payload_segment: String,
    pub signature_segment: String,
}

impl Token {
    /// The bytes the MAC is computed over: `header + "." + payload`.
    pub fn signing_input(&self) -> String {
        format!("{}.{}", self.header_segment, self.payload_segment)
    }

    pub fn to_compact_string(&self) -> String {
        format!(
            "{}.{}.{}",
            self.header_segment, self.payload_segment, self.signature_segment
        )
    }
}

/// The encrypted payload envelope: `{iv, tag, ct}`, each Base64url of the
/// raw bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    pub iv: String,
    pub tag: String,
    pub ct: String,
}
