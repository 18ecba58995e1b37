//! IPO inventory — the virtual seller's remaining stock.

use serde::{Deserialize, Serialize};

/// Unissued shares offered by the virtual SYSTEM seller.
///
/// Injected into the book as a synthetic ask whenever `shares_remaining > 0`
/// and consumed only by settlement. `shares_remaining` is monotonically
/// non-increasing and never negative.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IpoInventory {
    pub shares_remaining: i64,
    /// Fixed offering price in points per share.
    pub unit_price: i64,
    /// Optimistic-concurrency marker.
    pub version: u64,
}

impl IpoInventory {
    #[must_use]
    pub fn new(shares: i64, unit_price: i64) -> Self {
        Self {
            shares_remaining: shares.max(0),
            unit_price,
            version: 0,
        }
    }

    /// Whether the synthetic ask should appear in the book.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.shares_remaining > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_while_stock_remains() {
        let ipo = IpoInventory::new(100, 20);
        assert!(ipo.is_active());
        let empty = IpoInventory::new(0, 20);
        assert!(!empty.is_active());
    }

    #[test]
    fn negative_seed_clamps_to_zero() {
        let ipo = IpoInventory::new(-5, 20);
        assert_eq!(ipo.shares_remaining, 0);
        assert!(!ipo.is_active());
    }
}
