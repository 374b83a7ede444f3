//! Keyed HMAC-SHA-256 signing and constant-time verification.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::key::Key;

type HmacSha256 = Hmac<Sha256>;

/// Stateless HMAC-SHA-256 signer/verifier over a [`Key`]'s raw secret.
#[derive(Debug, Default, Clone, Copy)]
pub struct MacSigner;

impl MacSigner {
    pub fn new() -> Self {
        Self
    }

    /// Computes the MAC of `message` under `key`.
    pub fn sign(&self, key: &Key, message: &[u8]) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(key.secret()).expect("HMAC accepts keys of any length");
        mac.update(message);
        mac.finalize().into_bytes().to_vec()
    }

    /// Verifies `signature` against a freshly computed MAC, using a
    /// constant-time comparison rather than a variable-time early-exit
    /// compare.
    pub fn verify(&self, key: &Key, message: &[u8], signature: &[u8]) -> bool {
        let expected = self.sign(key, message);
        expected.ct_eq(signature).into()
    }
}
