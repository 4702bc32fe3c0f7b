//! Shared types for the intrusion detection pipeline.
//!
//! This crate provides the primitives every other component depends on:
//! packet/metric/severity domain types, the shared error taxonomy, and a
//! handful of lock-free counters used for pipeline statistics.

#![warn(missing_docs)]

pub mod error;
pub mod types;

pub use error::{NidsError, NidsResult};
pub use types::*;

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counter used for pipeline statistics (packets seen, alerts
/// emitted, cycles run, ...).
#[derive(Debug, Default)]
pub struct AtomicCounter(AtomicU64);

impl AtomicCounter {
    /// Create a new counter starting at `value`.
    pub const fn new(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    /// Increment and return the previous value.
    #[inline(always)]
    pub fn inc(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    /// Add `val` and return the previous value.
    #[inline(always)]
    pub fn add(&self, val: u64) -> u64 {
        self.0.fetch_add(val, Ordering::Relaxed)
    }

    /// Read the current value.
    #[inline(always)]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_counter_increments() {
        let counter = AtomicCounter::new(0);
        assert_eq!(counter.inc(), 0);
        assert_eq!(counter.inc(), 1);
        assert_eq!(counter.get(), 2);
    }
}
