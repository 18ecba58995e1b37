//! Trade records produced by settlement.
//!
//! A [`Trade`] is the immutable record of one matching event. It is created
//! exactly once per successful settlement and never mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{OrderId, Symbol, TradeId, UserId};

/// Immutable record of one fill between a buyer and a seller.
///
/// `seller_id` is `None` when the counterparty was the virtual IPO
/// inventory (the SYSTEM seller), in which case `sell_order_id` is `None`
/// as well — the synthetic ask is never persisted as an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub symbol: Symbol,
    pub buy_order_id: OrderId,
    pub sell_order_id: Option<OrderId>,
    pub buyer_id: UserId,
    pub seller_id: Option<UserId>,
    /// Execution price in points per share.
    pub price: i64,
    pub quantity: i64,
    /// `price * quantity`, the points that changed hands.
    pub amount: i64,
    pub executed_at: DateTime<Utc>,
}

impl Trade {
    /// Whether the selling side was the virtual IPO inventory.
    #[must_use]
    pub fn is_ipo(&self) -> bool {
        self.seller_id.is_none()
    }

    /// Display name of the selling party.
    #[must_use]
    pub fn seller_name(&self) -> String {
        match self.seller_id {
            Some(id) => id.to_string(),
            None => "SYSTEM".to_string(),
        }
    }
}

impl std::fmt::Display for Trade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Trade[{}] {} {} @ {} = {} ({} -> {})",
            self.id,
            self.symbol,
            self.quantity,
            self.price,
            self.amount,
            self.seller_name(),
            self.buyer_id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_trade(seller: Option<UserId>) -> Trade {
        Trade {
            id: TradeId::new(),
            symbol: Symbol::new("PNTS"),
            buy_order_id: OrderId::new(),
            sell_order_id: seller.map(|_| OrderId::new()),
            buyer_id: UserId::new(),
            seller_id: seller,
            price: 100,
            quantity: 5,
            amount: 500,
            executed_at: Utc::now(),
        }
    }

    #[test]
    fn ipo_trade_has_system_seller() {
        let trade = make_trade(None);
        assert!(trade.is_ipo());
        assert_eq!(trade.seller_name(), "SYSTEM");
    }

    #[test]
    fn user_trade_names_the_seller() {
        let seller = UserId::new();
        let trade = make_trade(Some(seller));
        assert!(!trade.is_ipo());
        assert_eq!(trade.seller_name(), seller.to_string());
    }

    #[test]
    fn trade_serde_roundtrip() {
        let trade = make_trade(None);
        let json = serde_json::to_string(&trade).unwrap();
        let back: Trade = serde_json::from_str(&json).unwrap();
        assert_eq!(trade.id, back.id);
        assert_eq!(back.amount, 500);
        assert!(back.seller_id.is_none());
    }
}
