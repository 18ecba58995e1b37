//! Continuous matching over the price-time ordered book.
//!
//! One run walks the best bid and best ask with two cursors, settling
//! every crossing pair until the book un-crosses. The run itself holds no
//! locks and mutates nothing directly — every fill goes through the
//! settlement engine's conditional effects, so a failed pair skips
//! forward instead of aborting the sweep.

use std::sync::{Arc, RwLock};

use chrono::Utc;
use pointmarket_ledger::{LedgerEffect, LedgerStore, RetryPolicy};
use pointmarket_matchcore::{BandGate, OrderBook, crosses, reference_price};
use pointmarket_settlement::{SellParty, SettlementEngine};
use pointmarket_types::{
    MarketConfig, MarketError, Order, OrderKind, OrderStatus, Result, Symbol, Trade,
};

use crate::notify::TradeListener;

/// Execution price for a crossing pair, in order of precedence:
/// 1. the synthetic IPO ask always trades at the IPO unit price;
/// 2. market against limit trades at the limit side's price;
/// 3. market against market trades at the reference price;
/// 4. limit against limit trades at the earlier order's price, with the
///    ask winning an exact timestamp tie.
#[must_use]
pub fn fair_price(bid: &Order, ask: &Order, reference: i64) -> i64 {
    if ask.is_system() {
        return ask.effective_price();
    }
    match (bid.kind, ask.kind) {
        (OrderKind::Market, OrderKind::Limit) => ask.effective_price(),
        (OrderKind::Limit, OrderKind::Market) => bid.effective_price(),
        (OrderKind::Market, OrderKind::Market) => reference,
        (OrderKind::Limit, OrderKind::Limit) => {
            if bid.created_at < ask.created_at {
                bid.effective_price()
            } else {
                ask.effective_price()
            }
        }
    }
}

/// Drives matching runs for one market.
pub struct MatchingEngine {
    ledger: Arc<dyn LedgerStore>,
    settlement: Arc<SettlementEngine>,
    config: Arc<RwLock<MarketConfig>>,
    listener: Arc<dyn TradeListener>,
    retry: RetryPolicy,
}

impl MatchingEngine {
    #[must_use]
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        settlement: Arc<SettlementEngine>,
        config: Arc<RwLock<MarketConfig>>,
        listener: Arc<dyn TradeListener>,
    ) -> Self {
        Self {
            ledger,
            settlement,
            config,
            listener,
            retry: RetryPolicy::default(),
        }
    }

    /// One matching sweep. Idempotent over a non-crossing book.
    ///
    /// Returns the trades settled this run. A retryable error (conflict
    /// retries exhausted) aborts the sweep so the scheduler can re-queue
    /// it; everything settled before the abort stays settled.
    #[allow(clippy::too_many_lines)]
    pub fn run(&self, symbol: &Symbol) -> Result<Vec<Trade>> {
        let config = self.config.read().expect("config lock poisoned").clone();
        let history = self.ledger.trades(symbol);
        let reference = reference_price(&history, Utc::now(), &config);
        let gate = BandGate::new(reference, config.band_pct);

        let ipo = self.ledger.ipo(symbol);
        let book = OrderBook::build(symbol.clone(), self.ledger.open_orders(symbol), ipo.as_ref());
        let (mut bids, mut asks) = book.into_sides();

        let mut trades = Vec::new();
        let mut bi = 0usize;
        let mut ai = 0usize;

        while bi < bids.len() && ai < asks.len() {
            if bids[bi].remaining_qty <= 0 {
                bi += 1;
                continue;
            }
            if asks[ai].remaining_qty <= 0 {
                ai += 1;
                continue;
            }

            // Band-held orders re-admit here or sit this run out.
            if bids[bi].status == OrderStatus::PendingBand {
                if self.try_promote(&gate, &bids[bi])? {
                    bids[bi].status = OrderStatus::Pending;
                } else {
                    bi += 1;
                    continue;
                }
            }
            if asks[ai].status == OrderStatus::PendingBand {
                if self.try_promote(&gate, &asks[ai])? {
                    asks[ai].status = OrderStatus::Pending;
                } else {
                    ai += 1;
                    continue;
                }
            }

            // Self-trade prevention: never cross orders from one owner.
            if bids[bi].user_id == asks[ai].user_id {
                ai += 1;
                continue;
            }

            // Book is sorted, so the first non-crossing pair ends the run.
            if !crosses(&bids[bi], &asks[ai]) {
                break;
            }

            let qty = bids[bi].remaining_qty.min(asks[ai].remaining_qty);
            let price = fair_price(&bids[bi], &asks[ai], reference);
            let sell_party = if asks[ai].is_system() {
                SellParty::Ipo
            } else {
                SellParty::Order(asks[ai].id)
            };

            match self.settlement.settle(symbol, bids[bi].id, sell_party, qty, price) {
                Ok(trade) => {
                    self.listener.on_trade_executed(&trade);
                    bids[bi].remaining_qty -= qty;
                    asks[ai].remaining_qty -= qty;
                    trades.push(trade);
                    if bids[bi].remaining_qty == 0 {
                        bi += 1;
                    }
                    if asks[ai].remaining_qty == 0 {
                        ai += 1;
                    }
                }
                Err(MarketError::InsufficientPoints {
                    required,
                    available,
                }) => {
                    tracing::warn!(
                        symbol = %symbol,
                        buy_order = %bids[bi].id,
                        required,
                        available,
                        "buyer cannot fund fill, skipping bid"
                    );
                    bi += 1;
                }
                Err(MarketError::InsufficientShares {
                    required,
                    available,
                }) => {
                    tracing::warn!(
                        symbol = %symbol,
                        sell_order = %asks[ai].id,
                        required,
                        available,
                        "seller cannot deliver fill, skipping ask"
                    );
                    ai += 1;
                }
                Err(MarketError::StaleMatch { order_id }) => {
                    if order_id == bids[bi].id {
                        bi += 1;
                    } else {
                        ai += 1;
                    }
                }
                Err(MarketError::FillAlreadySettled { buy_order_id }) => {
                    tracing::warn!(
                        symbol = %symbol,
                        buy_order = %buy_order_id,
                        "fill already settled, skipping ask"
                    );
                    ai += 1;
                }
                Err(MarketError::InvariantViolation { detail }) => {
                    tracing::error!(
                        symbol = %symbol,
                        buy_order = %bids[bi].id,
                        sell_order = %asks[ai].id,
                        qty,
                        price,
                        detail,
                        "invariant violation during settlement"
                    );
                    ai += 1;
                }
                Err(err) => return Err(err),
            }
        }

        Ok(trades)
    }

    /// Re-check a band-held order against the gate and promote it in the
    /// ledger if it now passes. Returns whether the order may match this
    /// run.
    fn try_promote(&self, gate: &BandGate, order: &Order) -> Result<bool> {
        if !gate.allows(order.effective_price()) {
            return Ok(false);
        }
        self.retry.run("band promotion", || {
            let fresh = self.ledger.order(order.id)?;
            if fresh.status != OrderStatus::PendingBand {
                // Promoted by an earlier run or cancelled meanwhile;
                // settlement revalidates either way.
                return Ok(());
            }
            self.ledger.apply_one(&LedgerEffect::TransitionOrder {
                order_id: order.id,
                to: OrderStatus::Pending,
                expected_version: fresh.version,
            })
        })?;
        tracing::debug!(order_id = %order.id, "band-held order re-admitted");
        Ok(true)
    }
}
