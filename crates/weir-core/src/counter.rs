//! Atomic counters for pipeline statistics.

use std::sync::atomic::{AtomicI64, Ordering};

/// A 64-bit atomic counter.
///
/// Besides `load` and `add`, it offers [`Counter::swap_to_zero`], which
/// reads the value and resets it in one atomic step. Stat reporters use it
/// to turn a running count into a per-interval figure without losing
/// increments that land between the read and the reset.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicI64,
}

impl Counter {
    pub const fn new() -> Self {
        Self {
            value: AtomicI64::new(0),
        }
    }

    /// Current value.
    pub fn load(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Add `n` (may be negative) and return the new value.
    pub fn add(&self, n: i64) -> i64 {
        self.value.fetch_add(n, Ordering::Relaxed) + n
    }

    /// Return the current value and reset the counter to zero.
    pub fn swap_to_zero(&self) -> i64 {
        self.value.swap(0, Ordering::Relaxed)
    }
}
