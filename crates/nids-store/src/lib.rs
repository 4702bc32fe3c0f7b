//! Persistent store (C2): aggregated metrics, host baselines, rules,
//! alert tables, training samples, and hybrid verdicts.
//!
//! Backed by SQLite behind a single serializing connection, per the
//! concurrency design: readers in the cycle worker observe only committed
//! state, and a window's metric rows become visible atomically.

pub mod rows;
pub mod schema;
pub mod store;

pub use rows::*;
pub use store::Store;
