use thiserror::Error;

/// Programmer errors raised by the cryptographic primitives.
///
/// These are never produced in response to attacker-controlled input during
/// verification — hostile tokens fail closed into a [`crate::verifier::Reason`]
/// instead. `CryptoError` signals caller misconfiguration: no usable signing
/// key, a key too short for the requested algorithm, or an AEAD operation
/// requested without the `aead` feature compiled in.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key set has no usable signing key")]
    NoSigningKey,
    #[error("key {kid:?} secret too short: need at least {min} bytes, got {got}")]
    SecretTooShort { kid: String, min: usize, got: usize },
    #[error("key id must not be empty")]
    EmptyKeyId,
    #[error("key createdAt must be positive")]
    InvalidCreatedAt,
    #[error("AEAD cipher unavailable in this build")]
    CipherUnavailable,
    #[error("AEAD encryption failed")]
    EncryptionFailed,
    #[error("AEAD decryption failed")]
    DecryptionFailed,
}

/// Programmer errors raised while canonicalizing or decoding caller-supplied
/// structured data (as opposed to a hostile token, which never raises).
#[derive(Debug, Error)]
pub enum InvalidFormat {
    #[error("invalid base64url: {0}")]
    Base64(String),
    #[error("canonical JSON requires finite numbers, found NaN or infinity")]
    NonFiniteFloat,
    #[error("expected a JSON object at the top level")]
    NotAnObject,
    #[error("malformed base URL: {0}")]
    Url(String),
}

/// Errors raised by [`crate::issuer::LinkBuilder::issue`] and
/// [`crate::issuer::LinkBuilder::create_url`].
#[derive(Debug, Error)]
pub enum IssueError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Format(#[from] InvalidFormat),
}
