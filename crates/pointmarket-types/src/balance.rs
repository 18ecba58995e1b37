//! Balance and position records held by the ledger.
//!
//! Every participant has a point balance split into `available` (usable for
//! new orders) and `reserved` (escrowed by resting buy orders), and a share
//! position split the same way (`reserved` backs resting sell orders).
//! Neither component is ever negative.

use serde::{Deserialize, Serialize};

/// A participant's point balance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceRecord {
    /// Points available for new orders.
    pub available: i64,
    /// Points escrowed by resting limit buy orders.
    pub reserved: i64,
    /// Optimistic-concurrency marker.
    pub version: u64,
}

impl BalanceRecord {
    #[must_use]
    pub fn new() -> Self {
        Self {
            available: 0,
            reserved: 0,
            version: 0,
        }
    }

    /// Total points (available + reserved).
    #[must_use]
    pub fn total(&self) -> i64 {
        self.available + self.reserved
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.available == 0 && self.reserved == 0
    }
}

impl Default for BalanceRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// A participant's share position in one instrument.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PositionRecord {
    /// Tradable shares.
    pub available: i64,
    /// Shares escrowed by resting sell orders.
    pub reserved: i64,
    /// Optimistic-concurrency marker.
    pub version: u64,
}

impl PositionRecord {
    #[must_use]
    pub fn new() -> Self {
        Self {
            available: 0,
            reserved: 0,
            version: 0,
        }
    }

    /// Total held shares (available + reserved).
    #[must_use]
    pub fn total(&self) -> i64 {
        self.available + self.reserved
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.available == 0 && self.reserved == 0
    }
}

impl Default for PositionRecord {
    fn default() -> Self {
        Self::new()
    }
}
