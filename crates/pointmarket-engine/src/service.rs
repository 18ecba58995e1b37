//! Service facade: the narrow interface external collaborators call.
//!
//! `place_order` validates shape, reserves funds or shares, persists, and
//! kicks the scheduler; `cancel_order` refunds the un-filled remainder
//! under the same conditional-update discipline the settlement engine
//! uses. Matching itself always happens asynchronously behind the
//! [`MatchTrigger`] seam.

use std::sync::{Arc, RwLock};

use chrono::Utc;
use pointmarket_ledger::{LedgerEffect, LedgerStore, RetryPolicy};
use pointmarket_matchcore::{BandGate, BookSnapshot, OrderBook, reference_price};
use pointmarket_types::{
    AuditReason, MarketConfig, MarketError, Order, OrderId, OrderKind, OrderSide, OrderStatus,
    Result, Symbol, UserId,
};
use rust_decimal::Decimal;

use crate::scheduler::MatchTrigger;

/// Outcome of a successful order placement.
#[derive(Debug, Clone)]
pub struct OrderReceipt {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub message: String,
}

/// Outcome of a cancel request. `cancelled == false` means the order was
/// already terminal; `status` reports what it settled into.
#[derive(Debug, Clone)]
pub struct CancelReceipt {
    pub cancelled: bool,
    pub status: OrderStatus,
    pub message: String,
}

/// The place/cancel/book/status boundary of the market.
pub struct MarketService {
    ledger: Arc<dyn LedgerStore>,
    trigger: Arc<dyn MatchTrigger>,
    config: Arc<RwLock<MarketConfig>>,
    retry: RetryPolicy,
}

impl MarketService {
    #[must_use]
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        trigger: Arc<dyn MatchTrigger>,
        config: Arc<RwLock<MarketConfig>>,
    ) -> Self {
        Self {
            ledger,
            trigger,
            config,
            retry: RetryPolicy::default(),
        }
    }

    /// Validate, reserve, persist, and schedule matching for a new order.
    ///
    /// Limit buys escrow `quantity * price`; sells escrow the shares.
    /// Market buys only precheck against the current cost basis — their
    /// balance is re-checked at settlement, where a shortfall skips the
    /// pair instead of aborting the run. A limit order priced outside the
    /// band is accepted as `PendingBand` and says so in the receipt.
    pub fn place_order(
        &self,
        user_id: UserId,
        symbol: &Symbol,
        side: OrderSide,
        kind: OrderKind,
        quantity: i64,
        limit_price: Option<i64>,
    ) -> Result<OrderReceipt> {
        let config = self.config.read().expect("config lock poisoned").clone();
        if *symbol != config.symbol {
            return Err(MarketError::UnknownSymbol(symbol.clone()));
        }

        let mut order = match kind {
            OrderKind::Limit => {
                let price = limit_price.ok_or_else(|| MarketError::InvalidOrder {
                    reason: "limit order requires a price".to_string(),
                })?;
                Order::limit(user_id, symbol.clone(), side, quantity, price)?
            }
            // A price on a market order is ignored, not rejected.
            OrderKind::Market => Order::market(user_id, symbol.clone(), side, quantity)?,
        };

        self.reserve_for(&order, &config)?;

        let mut message = "order accepted".to_string();
        if order.kind == OrderKind::Limit {
            let gate = self.band_gate(symbol, &config);
            if !gate.allows(order.effective_price()) {
                order.status = OrderStatus::PendingBand;
                message = "order accepted; waiting for price band".to_string();
            }
        }

        if let Err(err) = self.ledger.insert_order(order.clone()) {
            self.release_reservation(&order);
            return Err(err);
        }

        tracing::info!(
            order_id = %order.id,
            user = %user_id,
            side = %order.side,
            kind = %order.kind,
            quantity,
            price = order.price,
            status = %order.status,
            "order accepted"
        );
        self.trigger.trigger(symbol);

        Ok(OrderReceipt {
            order_id: order.id,
            status: order.status,
            message,
        })
    }

    /// Cancel an order, refunding exactly the un-filled remainder.
    ///
    /// Races with in-flight matching resolve through version
    /// preconditions: on conflict the order is re-read, and if it went
    /// terminal meanwhile the receipt reports its actual state instead of
    /// silently no-opping.
    pub fn cancel_order(
        &self,
        user_id: UserId,
        order_id: OrderId,
        reason: &str,
    ) -> Result<CancelReceipt> {
        let mut cancelled_symbol: Option<Symbol> = None;
        let receipt = self.retry.run("order cancel", || {
            let order = self.ledger.order(order_id)?;
            if order.user_id != user_id {
                return Err(MarketError::NotOrderOwner(order_id));
            }
            if !order.is_open() {
                return Ok(CancelReceipt {
                    cancelled: false,
                    status: order.status,
                    message: format!("already {}", order.status),
                });
            }

            let mut effects = vec![LedgerEffect::TransitionOrder {
                order_id,
                to: OrderStatus::Cancelled,
                expected_version: order.version,
            }];
            match (order.side, order.kind) {
                (OrderSide::Buy, OrderKind::Limit) => {
                    let price = order.price.unwrap_or(0);
                    let refund = order.remaining_qty * price;
                    if refund > 0 {
                        let balance = self.ledger.balance(user_id);
                        effects.push(LedgerEffect::ReleasePoints {
                            user_id,
                            amount: refund,
                            expected_version: balance.version,
                            reason: AuditReason::CancelRefund,
                        });
                    }
                }
                // Market buys never reserved anything.
                (OrderSide::Buy, OrderKind::Market) => {}
                (OrderSide::Sell, _) => {
                    if order.remaining_qty > 0 {
                        let position = self.ledger.position(user_id, &order.symbol);
                        effects.push(LedgerEffect::ReleaseShares {
                            user_id,
                            symbol: order.symbol.clone(),
                            qty: order.remaining_qty,
                            expected_version: position.version,
                        });
                    }
                }
            }

            if self.ledger.supports_atomic_apply() {
                self.ledger.apply_atomic(&effects)?;
            } else {
                self.ledger.apply_sequential(&effects)?;
            }
            cancelled_symbol = Some(order.symbol.clone());
            Ok(CancelReceipt {
                cancelled: true,
                status: OrderStatus::Cancelled,
                message: "order cancelled".to_string(),
            })
        })?;

        if receipt.cancelled {
            tracing::info!(order_id = %order_id, user = %user_id, reason, "order cancelled");
            if let Some(symbol) = cancelled_symbol {
                self.trigger.trigger(&symbol);
            }
        }
        Ok(receipt)
    }

    /// Aggregated depth view, best `depth` levels per side, synthetic IPO
    /// ask included.
    pub fn order_book(&self, symbol: &Symbol, depth: usize) -> Result<BookSnapshot> {
        let config = self.config.read().expect("config lock poisoned");
        if *symbol != config.symbol {
            return Err(MarketError::UnknownSymbol(symbol.clone()));
        }
        drop(config);
        let book = OrderBook::build(
            symbol.clone(),
            self.ledger.open_orders(symbol),
            self.ledger.ipo(symbol).as_ref(),
        );
        Ok(book.depth_snapshot(depth))
    }

    /// Current state of one order.
    pub fn order_status(&self, order_id: OrderId) -> Result<Order> {
        self.ledger.order(order_id)
    }

    /// Change the band percentage and wake the scheduler so band-held
    /// orders re-check immediately.
    pub fn set_band_pct(&self, band_pct: Decimal) {
        self.config.write().expect("config lock poisoned").band_pct = band_pct;
        tracing::info!(%band_pct, "price band updated");
        self.trigger.notify_config_changed();
    }

    // -- internals ---------------------------------------------------------

    fn band_gate(&self, symbol: &Symbol, config: &MarketConfig) -> BandGate {
        let reference = reference_price(&self.ledger.trades(symbol), Utc::now(), config);
        BandGate::new(reference, config.band_pct)
    }

    fn reserve_for(&self, order: &Order, config: &MarketConfig) -> Result<()> {
        match (order.side, order.kind) {
            (OrderSide::Buy, OrderKind::Limit) => {
                let price = order.price.unwrap_or(0);
                let amount = order.quantity * price;
                self.retry.run("balance reservation", || {
                    let balance = self.ledger.balance(order.user_id);
                    self.ledger.apply_one(&LedgerEffect::ReservePoints {
                        user_id: order.user_id,
                        amount,
                        expected_version: balance.version,
                        reason: AuditReason::OrderReserve,
                    })
                })
            }
            (OrderSide::Buy, OrderKind::Market) => {
                // Precheck only: the definitive funds check happens at
                // settlement, where the balance may have moved.
                let basis = self.market_buy_basis(&order.symbol, config);
                let cost = order.quantity.checked_mul(basis).ok_or_else(|| {
                    MarketError::InvalidOrder {
                        reason: "estimated cost overflows".to_string(),
                    }
                })?;
                let balance = self.ledger.balance(order.user_id);
                if balance.available < cost {
                    return Err(MarketError::InsufficientPoints {
                        required: cost,
                        available: balance.available,
                    });
                }
                Ok(())
            }
            (OrderSide::Sell, _) => self.retry.run("share reservation", || {
                let position = self.ledger.position(order.user_id, &order.symbol);
                self.ledger.apply_one(&LedgerEffect::ReserveShares {
                    user_id: order.user_id,
                    symbol: order.symbol.clone(),
                    qty: order.quantity,
                    expected_version: position.version,
                })
            }),
        }
    }

    /// Cost basis for a market-buy precheck: the best quoted ask
    /// (synthetic IPO included), else the reference price.
    fn market_buy_basis(&self, symbol: &Symbol, config: &MarketConfig) -> i64 {
        let book = OrderBook::build(
            symbol.clone(),
            self.ledger.open_orders(symbol),
            self.ledger.ipo(symbol).as_ref(),
        );
        book.best_quoted_ask()
            .unwrap_or_else(|| reference_price(&self.ledger.trades(symbol), Utc::now(), config))
    }

    /// Undo the acceptance-time escrow after a failed insert. Best effort:
    /// a failure here only logs — the order was never persisted, so no
    /// matching run will ever consume the escrow.
    fn release_reservation(&self, order: &Order) {
        let result = match (order.side, order.kind) {
            (OrderSide::Buy, OrderKind::Limit) => {
                let amount = order.quantity * order.price.unwrap_or(0);
                self.retry.run("reservation rollback", || {
                    let balance = self.ledger.balance(order.user_id);
                    self.ledger.apply_one(&LedgerEffect::ReleasePoints {
                        user_id: order.user_id,
                        amount,
                        expected_version: balance.version,
                        reason: AuditReason::OrderRelease,
                    })
                })
            }
            (OrderSide::Buy, OrderKind::Market) => Ok(()),
            (OrderSide::Sell, _) => self.retry.run("reservation rollback", || {
                let position = self.ledger.position(order.user_id, &order.symbol);
                self.ledger.apply_one(&LedgerEffect::ReleaseShares {
                    user_id: order.user_id,
                    symbol: order.symbol.clone(),
                    qty: order.quantity,
                    expected_version: position.version,
                })
            }),
        };
        if let Err(err) = result {
            tracing::error!(order_id = %order.id, error = %err, "escrow rollback failed");
        }
    }
}
