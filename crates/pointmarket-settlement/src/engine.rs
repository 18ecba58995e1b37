//! The settlement engine.
//!
//! `settle` applies one matched pair to the ledger. The effect group:
//! 1. buyer pays `qty * price` — limit buys consume escrow and release the
//!    price improvement, market buys debit available points;
//! 2. seller receives the proceeds (skipped for the IPO inventory);
//! 3. buyer position gains `qty` shares;
//! 4. seller escrowed shares drop by `qty`, or the IPO inventory does;
//! 5. both orders record the fill and transition status;
//! 6. one immutable trade appends, with audit entries for every balance
//!    mutation.
//!
//! Every effect is conditional on the version read in the same attempt, so
//! a concurrent mutation anywhere in the group conflicts and the whole
//! attempt retries against fresh reads. Resource shortfalls discovered at
//! execution time are not retried — the matching run skips past the
//! failing side.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use pointmarket_types::{
    AuditReason, MarketError, Order, OrderId, OrderKind, OrderSide, Result, Symbol, Trade, TradeId,
    UserId, constants,
};

use pointmarket_ledger::{LedgerEffect, LedgerStore, RetryPolicy};

use crate::idempotency::{FillKey, IdempotencyGuard};

/// The selling side of a pair: a resting order or the virtual inventory.
#[derive(Debug, Clone, Copy)]
pub enum SellParty {
    Order(OrderId),
    Ipo,
}

/// Applies matched pairs to the ledger atomically.
pub struct SettlementEngine {
    ledger: Arc<dyn LedgerStore>,
    retry: RetryPolicy,
    guard: Mutex<IdempotencyGuard>,
}

impl SettlementEngine {
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self::with_retry(ledger, RetryPolicy::default())
    }

    #[must_use]
    pub fn with_retry(ledger: Arc<dyn LedgerStore>, retry: RetryPolicy) -> Self {
        Self {
            ledger,
            retry,
            guard: Mutex::new(IdempotencyGuard::new(
                constants::SETTLEMENT_IDEMPOTENCY_CACHE_SIZE,
            )),
        }
    }

    /// Settle `qty` shares at `price` between a buy order and a sell party.
    ///
    /// On success every effect has applied; on error none have (atomic
    /// stores) or a prefix has, each effect still individually guarded
    /// (sequential fallback).
    pub fn settle(
        &self,
        symbol: &Symbol,
        buy_order_id: OrderId,
        sell: SellParty,
        qty: i64,
        price: i64,
    ) -> Result<Trade> {
        if qty <= 0 || price <= 0 {
            return Err(MarketError::InvariantViolation {
                detail: format!("settle called with qty {qty} price {price}"),
            });
        }
        let amount = qty
            .checked_mul(price)
            .ok_or_else(|| MarketError::InvariantViolation {
                detail: format!("trade amount overflows: {qty} * {price}"),
            })?;

        let trade = self.retry.run("settlement", || {
            let buy = self.read_side(buy_order_id, OrderSide::Buy, qty)?;

            let key = FillKey {
                buy_order_id,
                sell_order_id: match sell {
                    SellParty::Order(id) => Some(id),
                    SellParty::Ipo => None,
                },
                buy_filled_before: buy.filled_qty,
            };
            if self.guard.lock().expect("guard lock poisoned").is_settled(&key) {
                return Err(MarketError::FillAlreadySettled { buy_order_id });
            }

            let mut effects = Vec::with_capacity(8);
            self.stage_buyer_payment(&buy, qty, price, amount, &mut effects)?;
            let (sell_order_id, seller_id) =
                self.stage_seller_delivery(symbol, &buy, sell, qty, amount, &mut effects)?;

            let buyer_pos = self.ledger.position(buy.user_id, symbol);
            effects.push(LedgerEffect::CreditShares {
                user_id: buy.user_id,
                symbol: symbol.clone(),
                qty,
                expected_version: buyer_pos.version,
            });
            effects.push(LedgerEffect::ApplyFill {
                order_id: buy_order_id,
                qty,
                expected_version: buy.version,
            });

            let trade = Trade {
                id: TradeId::new(),
                symbol: symbol.clone(),
                buy_order_id,
                sell_order_id,
                buyer_id: buy.user_id,
                seller_id,
                price,
                quantity: qty,
                amount,
                executed_at: Utc::now(),
            };
            effects.push(LedgerEffect::RecordTrade {
                trade: trade.clone(),
            });

            if self.ledger.supports_atomic_apply() {
                self.ledger.apply_atomic(&effects)?;
            } else {
                self.ledger.apply_sequential(&effects)?;
            }

            self.guard
                .lock()
                .expect("guard lock poisoned")
                .mark_settled(key);
            Ok(trade)
        })?;

        tracing::info!(
            symbol = %symbol,
            trade_id = %trade.id,
            price = trade.price,
            quantity = trade.quantity,
            amount = trade.amount,
            seller = %trade.seller_name(),
            buyer = %trade.buyer_id,
            "trade settled"
        );
        Ok(trade)
    }

    /// Re-read one side and check it can still absorb the fill.
    fn read_side(&self, order_id: OrderId, side: OrderSide, qty: i64) -> Result<Order> {
        let order = self.ledger.order(order_id)?;
        if order.side != side {
            return Err(MarketError::InvariantViolation {
                detail: format!("order {order_id} is not a {side} order"),
            });
        }
        if !order.is_open() || order.remaining_qty < qty {
            return Err(MarketError::StaleMatch { order_id });
        }
        Ok(order)
    }

    fn stage_buyer_payment(
        &self,
        buy: &Order,
        qty: i64,
        price: i64,
        amount: i64,
        effects: &mut Vec<LedgerEffect>,
    ) -> Result<()> {
        let balance = self.ledger.balance(buy.user_id);
        match buy.kind {
            OrderKind::Limit => {
                // Escrow held qty * limit; the fill consumes qty * price and
                // returns the improvement.
                let limit_price = buy.price.unwrap_or(price);
                let reserved_cost = qty.checked_mul(limit_price).ok_or_else(|| {
                    MarketError::InvariantViolation {
                        detail: format!("escrow amount overflows: {qty} * {limit_price}"),
                    }
                })?;
                effects.push(LedgerEffect::ConsumeReservedPoints {
                    user_id: buy.user_id,
                    amount,
                    expected_version: balance.version,
                    reason: AuditReason::TradePayment,
                });
                let improvement = reserved_cost - amount;
                if improvement > 0 {
                    effects.push(LedgerEffect::ReleasePoints {
                        user_id: buy.user_id,
                        amount: improvement,
                        expected_version: balance.version,
                        reason: AuditReason::OrderRelease,
                    });
                }
            }
            OrderKind::Market => {
                // Market buys never reserved; the balance may have moved
                // since acceptance and the debit guard is the last word.
                effects.push(LedgerEffect::DebitPoints {
                    user_id: buy.user_id,
                    amount,
                    expected_version: balance.version,
                    reason: AuditReason::TradePayment,
                });
            }
        }
        Ok(())
    }

    fn stage_seller_delivery(
        &self,
        symbol: &Symbol,
        buy: &Order,
        sell: SellParty,
        qty: i64,
        amount: i64,
        effects: &mut Vec<LedgerEffect>,
    ) -> Result<(Option<OrderId>, Option<UserId>)> {
        match sell {
            SellParty::Order(sell_order_id) => {
                let sell_order = self.read_side(sell_order_id, OrderSide::Sell, qty)?;
                if sell_order.user_id == buy.user_id {
                    return Err(MarketError::InvariantViolation {
                        detail: format!(
                            "self-trade reached settlement: user {} on both sides",
                            buy.user_id
                        ),
                    });
                }
                let position = self.ledger.position(sell_order.user_id, symbol);
                effects.push(LedgerEffect::ConsumeReservedShares {
                    user_id: sell_order.user_id,
                    symbol: symbol.clone(),
                    qty,
                    expected_version: position.version,
                });
                let proceeds_balance = self.ledger.balance(sell_order.user_id);
                effects.push(LedgerEffect::CreditPoints {
                    user_id: sell_order.user_id,
                    amount,
                    expected_version: proceeds_balance.version,
                    reason: AuditReason::TradeProceeds,
                });
                effects.push(LedgerEffect::ApplyFill {
                    order_id: sell_order_id,
                    qty,
                    expected_version: sell_order.version,
                });
                Ok((Some(sell_order_id), Some(sell_order.user_id)))
            }
            SellParty::Ipo => {
                let ipo = self.ledger.ipo(symbol).ok_or_else(|| {
                    MarketError::InvariantViolation {
                        detail: format!("IPO fill without inventory for {symbol}"),
                    }
                })?;
                effects.push(LedgerEffect::ConsumeIpo {
                    symbol: symbol.clone(),
                    qty,
                    expected_version: ipo.version,
                });
                Ok((None, None))
            }
        }
    }
}
