//! # pointmarket-settlement
//!
//! The settlement engine: applies one matched pair to the ledger as a
//! single atomic group of effects — buyer pays, seller (or the IPO
//! inventory) delivers, both orders fill, one trade and its audit entries
//! append. Conflicts retry with backoff; stores without multi-record
//! atomicity degrade to a sequential, still-conditional application.

pub mod engine;
pub mod idempotency;

pub use engine::{SellParty, SettlementEngine};
pub use idempotency::{FillKey, IdempotencyGuard};
