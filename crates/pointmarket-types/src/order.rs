//! Order model for the pointmarket matching engine.
//!
//! Orders are constructed through [`Order::limit`] / [`Order::market`],
//! which reject invalid shapes up front. Once persisted, an order is only
//! ever transitioned — fills come from the matching engine, cancellation
//! from the owner — and never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{IpoInventory, MarketError, OrderId, Result, Symbol, UserId};

/// Which side of the book this order is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// The kind of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderKind {
    Limit,
    Market,
}

impl std::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Limit => write!(f, "LIMIT"),
            Self::Market => write!(f, "MARKET"),
        }
    }
}

/// Lifecycle status of an order.
///
/// `PendingBand → Pending → Partial → Filled`; every non-terminal state may
/// also transition to `Cancelled`. `Filled` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Accepted but priced outside the current band; waiting for the band
    /// to widen or the reference price to move.
    PendingBand,
    Pending,
    Partial,
    Filled,
    Cancelled,
}

impl OrderStatus {
    /// Whether an order in this status still participates in matching.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::PendingBand | Self::Pending | Self::Partial)
    }

    /// Terminal statuses permit no further mutation.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PendingBand => write!(f, "PENDING_BAND"),
            Self::Pending => write!(f, "PENDING"),
            Self::Partial => write!(f, "PARTIAL"),
            Self::Filled => write!(f, "FILLED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// A participant's buy or sell order over the single instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub symbol: Symbol,
    pub side: OrderSide,
    pub kind: OrderKind,
    pub status: OrderStatus,
    /// Limit price in points per share. `None` for market orders.
    pub price: Option<i64>,
    /// Original quantity at submission.
    pub quantity: i64,
    pub remaining_qty: i64,
    pub filled_qty: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency marker, bumped by the ledger on every write.
    pub version: u64,
}

impl Order {
    /// Create a limit order. Rejects non-positive quantity or price.
    pub fn limit(
        user_id: UserId,
        symbol: Symbol,
        side: OrderSide,
        quantity: i64,
        price: i64,
    ) -> Result<Self> {
        if quantity <= 0 {
            return Err(MarketError::InvalidOrder {
                reason: format!("quantity must be positive, got {quantity}"),
            });
        }
        if price <= 0 {
            return Err(MarketError::InvalidOrder {
                reason: format!("limit price must be positive, got {price}"),
            });
        }
        quantity
            .checked_mul(price)
            .ok_or_else(|| MarketError::InvalidOrder {
                reason: "quantity * price overflows".to_string(),
            })?;
        let now = Utc::now();
        Ok(Self {
            id: OrderId::new(),
            user_id,
            symbol,
            side,
            kind: OrderKind::Limit,
            status: OrderStatus::Pending,
            price: Some(price),
            quantity,
            remaining_qty: quantity,
            filled_qty: 0,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// Create a market order. Rejects non-positive quantity.
    pub fn market(user_id: UserId, symbol: Symbol, side: OrderSide, quantity: i64) -> Result<Self> {
        if quantity <= 0 {
            return Err(MarketError::InvalidOrder {
                reason: format!("quantity must be positive, got {quantity}"),
            });
        }
        let now = Utc::now();
        Ok(Self {
            id: OrderId::new(),
            user_id,
            symbol,
            side,
            kind: OrderKind::Market,
            status: OrderStatus::Pending,
            price: None,
            quantity,
            remaining_qty: quantity,
            filled_qty: 0,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// The standing virtual sell order representing unissued IPO inventory.
    ///
    /// Never persisted: rebuilt into the book on every matching run while
    /// `shares_remaining > 0`. Its `created_at` is pinned to the UNIX epoch
    /// so timestamp comparison is always total, and the book appends it
    /// behind genuine asks at the same price.
    #[must_use]
    pub fn synthetic_ipo(symbol: Symbol, ipo: &IpoInventory) -> Self {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        Self {
            id: OrderId::SYNTHETIC,
            user_id: UserId::SYSTEM,
            symbol,
            side: OrderSide::Sell,
            kind: OrderKind::Limit,
            status: OrderStatus::Pending,
            price: Some(ipo.unit_price),
            quantity: ipo.shares_remaining,
            remaining_qty: ipo.shares_remaining,
            filled_qty: 0,
            created_at: epoch,
            updated_at: epoch,
            version: ipo.version,
        }
    }

    /// Price used for book ordering and crossing checks.
    ///
    /// Market buys cross any ask; market sells cross any bid.
    #[must_use]
    pub fn effective_price(&self) -> i64 {
        match (self.kind, self.side) {
            (OrderKind::Limit, _) => self.price.unwrap_or(0),
            (OrderKind::Market, OrderSide::Buy) => i64::MAX,
            (OrderKind::Market, OrderSide::Sell) => 0,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Filled
    }

    /// Whether this is the synthetic IPO sell order.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.user_id.is_system()
    }
}
