//! Issuance and verification of magic-link tokens: compact, URL-embeddable,
//! cryptographically protected tokens for passwordless sign-in, email
//! verification, and time-bounded one-click actions.
//!
//! A token carries a subject, timing bounds, an optional audience, optional
//! request-context bindings, and a caller-defined claim bag. Integrity is
//! mandatory via keyed HMAC-SHA-256; confidentiality via AES-256-GCM is
//! optional and feature-gated (see the `aead` Cargo feature).
//!
//! The two entry points are [`issuer::LinkBuilder`] and [`verifier::Verifier`].

pub mod cipher;
pub mod claims;
pub mod clock;
pub mod config;
pub mod encoding;
pub mod error;
pub mod issuer;
pub mod key;
pub mod mac;
pub mod nonce;
pub mod verifier;

pub use claims::Claims;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, MagicLinkConfig};
pub use error::{CryptoError, InvalidFormat, IssueError};
pub use issuer::{CreateOptions, LinkBuilder};
pub use key::{Key, KeySet};
pub use nonce::{BlackholeNonceStore, InMemoryNonceStore, NonceStore};
pub use verifier::{Reason, RequestContext, Verifier, VerifyOptions};
