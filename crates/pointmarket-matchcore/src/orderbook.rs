//! The order book for one instrument, rebuilt per matching run.
//!
//! Uses `BTreeMap` for price-level ordering:
//! - **Bids** (buys): `BTreeMap<Reverse<i64>, PriceLevel>` -- highest price first
//! - **Asks** (sells): `BTreeMap<i64, PriceLevel>` -- lowest price first
//!
//! Orders are inserted in `(created_at, id)` order so every level is FIFO
//! by submission time; the tie-break is total because `created_at` is
//! always a concrete UTC instant (the synthetic IPO ask normalizes to the
//! UNIX epoch) and equal timestamps fall back to the time-ordered id.
//! The synthetic ask is inserted after all genuine orders, landing behind
//! equal-priced real asks.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use pointmarket_types::{IpoInventory, Order, OrderKind, OrderSide, Symbol};
use serde::{Deserialize, Serialize};

use crate::price_level::PriceLevel;

/// Price-ordered view of all open orders plus the synthetic IPO ask.
#[derive(Debug)]
pub struct OrderBook {
    pub symbol: Symbol,
    /// Buy side: highest price first (`Reverse` key).
    bids: BTreeMap<Reverse<i64>, PriceLevel>,
    /// Sell side: lowest price first.
    asks: BTreeMap<i64, PriceLevel>,
}

/// One aggregated depth level of a [`BookSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: i64,
    pub quantity: i64,
    pub order_count: usize,
}

/// Aggregated depth view for market-data consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub symbol: Symbol,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl OrderBook {
    /// Build the book from a ledger snapshot of open orders.
    ///
    /// Orders not matching the symbol, closed, or drained to zero are
    /// dropped. The synthetic IPO ask is appended last while inventory
    /// remains.
    #[must_use]
    pub fn build(symbol: Symbol, orders: Vec<Order>, ipo: Option<&IpoInventory>) -> Self {
        let mut book = Self {
            symbol: symbol.clone(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
        };

        let mut orders: Vec<Order> = orders
            .into_iter()
            .filter(|o| o.symbol == symbol && o.is_open() && o.remaining_qty > 0)
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        for order in orders {
            book.insert(order);
        }

        if let Some(ipo) = ipo {
            if ipo.is_active() {
                book.insert(Order::synthetic_ipo(symbol, ipo));
            }
        }

        book
    }

    fn insert(&mut self, order: Order) {
        let price = order.effective_price();
        match order.side {
            OrderSide::Buy => {
                self.bids
                    .entry(Reverse(price))
                    .or_insert_with(|| PriceLevel::new(price))
                    .push_back(order);
            }
            OrderSide::Sell => {
                self.asks
                    .entry(price)
                    .or_insert_with(|| PriceLevel::new(price))
                    .push_back(order);
            }
        }
    }

    /// Best (highest) bid price, or `None` if no bids.
    #[must_use]
    pub fn best_bid(&self) -> Option<i64> {
        self.bids.keys().next().map(|r| r.0)
    }

    /// Best (lowest) ask price, or `None` if no asks.
    #[must_use]
    pub fn best_ask(&self) -> Option<i64> {
        self.asks.keys().next().copied()
    }

    /// Lowest *quoted* ask: skips market sells (effective price 0), so it
    /// is usable as a cost basis for market-buy prechecks.
    #[must_use]
    pub fn best_quoted_ask(&self) -> Option<i64> {
        self.asks.keys().find(|p| **p > 0).copied()
    }

    /// Iterate bid levels from best (highest) to worst.
    pub fn bid_levels(&self) -> impl Iterator<Item = &PriceLevel> {
        self.bids.values()
    }

    /// Iterate ask levels from best (lowest) to worst.
    pub fn ask_levels(&self) -> impl Iterator<Item = &PriceLevel> {
        self.asks.values()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Flatten both sides into priority-ordered sequences for the
    /// matching cursors: bids best-first, asks best-first.
    #[must_use]
    pub fn into_sides(self) -> (Vec<Order>, Vec<Order>) {
        let bids = self
            .bids
            .into_values()
            .flat_map(|level| level.orders)
            .collect();
        let asks = self
            .asks
            .into_values()
            .flat_map(|level| level.orders)
            .collect();
        (bids, asks)
    }

    /// Aggregated depth snapshot, best `depth` levels per side.
    #[must_use]
    pub fn depth_snapshot(&self, depth: usize) -> BookSnapshot {
        let aggregate = |level: &PriceLevel| BookLevel {
            price: level.price,
            quantity: level.total_quantity(),
            order_count: level.len(),
        };
        BookSnapshot {
            symbol: self.symbol.clone(),
            bids: self.bid_levels().take(depth).map(aggregate).collect(),
            asks: self.ask_levels().take(depth).map(aggregate).collect(),
        }
    }
}

/// Whether an order pair crosses: a buy lifts any ask at or below its
/// effective price.
#[must_use]
pub fn crosses(bid: &Order, ask: &Order) -> bool {
    debug_assert_eq!(bid.side, OrderSide::Buy);
    debug_assert_eq!(ask.side, OrderSide::Sell);
    bid.kind == OrderKind::Market
        || ask.kind == OrderKind::Market
        || bid.effective_price() >= ask.effective_price()
}
