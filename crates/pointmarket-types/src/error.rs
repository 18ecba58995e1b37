//! Error types for the pointmarket engine.
//!
//! All errors use the `MKT_ERR_` prefix convention for easy grepping in
//! logs. Error codes are grouped by subsystem:
//! - 1xx: Order errors
//! - 2xx: Resource (points / shares) errors
//! - 4xx: Storage / concurrency errors
//! - 5xx: Matching errors
//! - 6xx: Settlement errors
//! - 9xx: General / internal errors

use thiserror::Error;

use crate::{OrderId, OrderStatus, Symbol};

/// Central error enum for all pointmarket operations.
#[derive(Debug, Error)]
pub enum MarketError {
    // =================================================================
    // Order Errors (1xx)
    // =================================================================
    /// The requested order was not found in the ledger.
    #[error("MKT_ERR_100: Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order failed validation (bad quantity, missing price, etc.).
    #[error("MKT_ERR_101: Invalid order: {reason}")]
    InvalidOrder { reason: String },

    /// An order with this ID already exists.
    #[error("MKT_ERR_102: Order already exists: {0}")]
    DuplicateOrder(OrderId),

    /// The order cannot be cancelled in its current state.
    #[error("MKT_ERR_103: Order cannot be cancelled: already {status}")]
    OrderNotCancellable { status: OrderStatus },

    /// The caller does not own the order it tried to mutate.
    #[error("MKT_ERR_104: Order {0} belongs to another user")]
    NotOrderOwner(OrderId),

    /// The request named an instrument this market does not serve.
    #[error("MKT_ERR_105: Unknown symbol: {0}")]
    UnknownSymbol(Symbol),

    // =================================================================
    // Resource Errors (2xx)
    // =================================================================
    /// Not enough available points for the operation.
    #[error("MKT_ERR_200: insufficient points: required {required}, available {available}")]
    InsufficientPoints { required: i64, available: i64 },

    /// Not enough tradable shares for the operation.
    #[error("MKT_ERR_201: insufficient shares: required {required}, available {available}")]
    InsufficientShares { required: i64, available: i64 },

    // =================================================================
    // Storage / Concurrency Errors (4xx)
    // =================================================================
    /// An optimistic precondition failed: the record changed between read
    /// and write. Retried internally by the retry policy.
    #[error("MKT_ERR_400: Conflict updating {entity}")]
    Conflict { entity: String },

    /// The retry policy exhausted its attempts on conflicts. Retryable at
    /// the scheduler level (re-queue the run), never fatal.
    #[error("MKT_ERR_401: Retries exhausted after {attempts} attempts updating {entity}")]
    RetryExhausted { entity: String, attempts: u32 },

    // =================================================================
    // Matching Errors (5xx)
    // =================================================================
    /// An order observed by the matching run no longer has the expected
    /// remaining quantity or open status (e.g., cancelled mid-run).
    #[error("MKT_ERR_500: Order {order_id} changed since the matching run observed it")]
    StaleMatch { order_id: OrderId },

    // =================================================================
    // Settlement Errors (6xx)
    // =================================================================
    /// The same fill offset was presented for settlement twice.
    #[error("MKT_ERR_600: Fill for buy order {buy_order_id} already settled")]
    FillAlreadySettled { buy_order_id: OrderId },

    /// A guard that the conditional-update discipline should make
    /// unreachable fired anyway. Fatal to that settlement only; logged
    /// loud because it signals an implementation bug.
    #[error("MKT_ERR_601: Invariant violation: {detail}")]
    InvariantViolation { detail: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("MKT_ERR_900: Internal error: {0}")]
    Internal(String),
}

impl MarketError {
    /// Whether the scheduler should re-queue the matching run that
    /// surfaced this error instead of treating it as terminal.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Conflict { .. } | Self::RetryExhausted { .. }
        )
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, MarketError>;
