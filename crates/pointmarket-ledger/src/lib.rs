//! # pointmarket-ledger
//!
//! The ledger store: the only holder of shared mutable state — balances,
//! positions, orders, trades, and the IPO inventory.
//!
//! All writes go through **conditional effects** ([`LedgerEffect`]): each
//! effect names the version the target record had when the caller read it,
//! and fails with a conflict if the record moved since. Groups of effects
//! apply all-or-nothing via [`LedgerStore::apply_atomic`]; stores that
//! cannot offer multi-record atomicity report it and callers fall back to
//! [`LedgerStore::apply_sequential`] (each effect still conditional).
//!
//! Conflicts are expected under concurrency; the [`RetryPolicy`] wraps
//! read-build-apply loops with bounded exponential backoff plus jitter.

pub mod memory;
pub mod retry;
pub mod store;

pub use memory::MemoryLedger;
pub use retry::RetryPolicy;
pub use store::{LedgerEffect, LedgerStore};
