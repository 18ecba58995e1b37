//! # pointmarket-types
//!
//! Shared types, errors, and configuration for the **pointmarket**
//! continuous double-auction engine.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`OrderId`], [`UserId`], [`TradeId`], [`Symbol`]
//! - **Order model**: [`Order`], [`OrderSide`], [`OrderKind`], [`OrderStatus`]
//! - **Trade model**: [`Trade`]
//! - **Ledger records**: [`BalanceRecord`], [`PositionRecord`], [`IpoInventory`]
//! - **Audit model**: [`AuditEntry`], [`AuditReason`]
//! - **Configuration**: [`MarketConfig`], [`SchedulerConfig`]
//! - **Errors**: [`MarketError`] with `MKT_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod audit;
pub mod balance;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod ipo;
pub mod order;
pub mod trade;

// Re-export all primary types at crate root for ergonomic imports:
//   use pointmarket_types::{Order, OrderSide, Trade, BalanceRecord, ...};

pub use audit::*;
pub use balance::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use ipo::*;
pub use order::*;
pub use trade::*;

// Constants are accessed via `pointmarket_types::constants::FOO`
// (not re-exported to avoid name collisions).
