//! Replay prevention: the nonce store contract.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// A single-method replay ledger. `consume` must be atomic (test-and-set):
/// it returns `true` on the first call for a given `jti` while the entry is
/// unexpired, and `false` on any subsequent call, without mutating storage
/// on a `false` return. Implementations must be safe under concurrent
/// callers and should garbage-collect expired entries opportunistically.
pub trait NonceStore: Send + Sync {
    fn consume(&self, jti: &str, expires_at: i64) -> bool;
}

/// Reference in-memory implementation: a `jti -> expiresAt` map, swept for
/// expired entries on each call.
#[derive(Clone, Default)]
pub struct InMemoryNonceStore {
    inner: Arc<Mutex<HashMap<String, i64>>>,
}

impl InMemoryNonceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn purge_expired(entries: &mut HashMap<String, i64>, now: i64) {
        entries.retain(|_, &mut exp| exp > now);
    }
}

impl NonceStore for InMemoryNonceStore {
    fn consume(&self, jti: &str, expires_at: i64) -> bool {
        let now = crate::clock::SystemClock.now();
        let mut guard = self.inner.lock();
        Self::purge_expired(&mut guard, now);
        match guard.get(jti) {
            Some(_) => false,
            None => {
                guard.insert(jti.to_string(), expires_at);
                true
            }
        }
    }
}

/// Accepts every `jti` unconditionally. For multi-use tokens (no `jti`,
/// `consume` is never called) and for callers who have deliberately opted
/// out of single-use enforcement.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlackholeNonceStore;

impl NonceStore for BlackholeNonceStore {
    fn consume(&self, _jti: &str, _expires_at: i64) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_consume_succeeds_second_fails() {
        let store = InMemoryNonceStore::new();
        assert!(store.consume("jti-1", 9_999_999_999));
        assert!(!store.consume("jti-1", 9_999_999_999));
    }

    #[test]
    fn distinct_jtis_are_independent() {
        let store = InMemoryNonceStore::new();
        assert!(store.consume("a", 9_999_999_999));
        assert!(store.consume("b", 9_999_999_999));
    }

    #[test]
    fn expired_entry_can_be_reclaimed() {
        let store = InMemoryNonceStore::new();
        assert!(store.consume("jti-1", 1));
        // Far past expiry, so a later consume call sweeps and re-admits it.
        assert!(store.consume("jti-1", 9_999_999_999));
    }

    #[test]
    fn blackhole_always_succeeds() {
        let store = BlackholeNonceStore;
        assert!(store.consume("x", 1));
        assert!(store.consume("x", 1));
    }

    #[test]
    fn false_return_does_not_mutate_state() {
        let store = InMemoryNonceStore::new();
        assert!(store.consume("jti-1", 9_999_999_999));
        assert!(!store.consume("jti-1", 9_999_999_999));
        // A third call still observes the entry as already consumed.
        assert!(!store.consume("jti-1", 9_999_999_999));
    }
}
