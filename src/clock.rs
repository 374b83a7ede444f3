//! Wall-clock abstraction.
//!
//! Stateless and safe for concurrent use; the core never reads the system
//! clock directly outside this trait, so tests can substitute a fixed clock.

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds-since-epoch clock. Monotonic-agnostic: implementations may wrap
/// the system wall clock or a fixed value for testing.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// [`Clock`] backed by [`SystemTime::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

/// Fixed clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0
    }
}
