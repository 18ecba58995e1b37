//! In-process ledger store.
//!
//! A single `Mutex` guards the record maps; the conditional-update contract
//! still holds so callers behave identically against a store with finer
//! internal concurrency. Effect groups stage on copies and commit only if
//! every precondition and guard passes.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use pointmarket_types::{
    AuditEntry, AuditReason, BalanceRecord, IpoInventory, MarketError, Order, OrderId, OrderStatus,
    PositionRecord, Result, Symbol, Trade, UserId,
};

use crate::store::{LedgerEffect, LedgerStore};

#[derive(Default)]
struct Inner {
    balances: HashMap<UserId, BalanceRecord>,
    positions: HashMap<(UserId, Symbol), PositionRecord>,
    orders: HashMap<OrderId, Order>,
    ipos: HashMap<Symbol, IpoInventory>,
    trades: Vec<Trade>,
    audit: Vec<AuditEntry>,
}

/// In-memory [`LedgerStore`] with full atomic-apply support.
#[derive(Default)]
pub struct MemoryLedger {
    inner: Mutex<Inner>,
}

/// Mutations staged while validating one effect group. Loaded versions are
/// kept separately so several effects in one group may target the same
/// record under the version observed at group entry.
#[derive(Default)]
struct Staged {
    balances: HashMap<UserId, (BalanceRecord, u64)>,
    positions: HashMap<(UserId, Symbol), (PositionRecord, u64)>,
    orders: HashMap<OrderId, (Order, u64)>,
    ipos: HashMap<Symbol, (IpoInventory, u64)>,
    trades: Vec<Trade>,
    audit: Vec<AuditEntry>,
}

impl Staged {
    fn balance(&mut self, inner: &Inner, user_id: UserId) -> &mut (BalanceRecord, u64) {
        self.balances.entry(user_id).or_insert_with(|| {
            let rec = inner.balances.get(&user_id).copied().unwrap_or_default();
            (rec, rec.version)
        })
    }

    fn position(
        &mut self,
        inner: &Inner,
        user_id: UserId,
        symbol: &Symbol,
    ) -> &mut (PositionRecord, u64) {
        self.positions
            .entry((user_id, symbol.clone()))
            .or_insert_with(|| {
                let rec = inner
                    .positions
                    .get(&(user_id, symbol.clone()))
                    .copied()
                    .unwrap_or_default();
                (rec, rec.version)
            })
    }

    fn order(&mut self, inner: &Inner, order_id: OrderId) -> Result<&mut (Order, u64)> {
        if !self.orders.contains_key(&order_id) {
            let rec = inner
                .orders
                .get(&order_id)
                .cloned()
                .ok_or(MarketError::OrderNotFound(order_id))?;
            let version = rec.version;
            self.orders.insert(order_id, (rec, version));
        }
        Ok(self.orders.get_mut(&order_id).expect("staged above"))
    }

    fn ipo(&mut self, inner: &Inner, symbol: &Symbol) -> Result<&mut (IpoInventory, u64)> {
        if !self.ipos.contains_key(symbol) {
            let rec = inner
                .ipos
                .get(symbol)
                .copied()
                .ok_or_else(|| MarketError::InvariantViolation {
                    detail: format!("no IPO inventory for {symbol}"),
                })?;
            self.ipos.insert(symbol.clone(), (rec, rec.version));
        }
        Ok(self.ipos.get_mut(symbol).expect("staged above"))
    }

    fn record_audit(&mut self, user_id: UserId, amount: i64, available: i64, reason: AuditReason) {
        self.audit.push(AuditEntry {
            user_id,
            amount,
            resulting_available: available,
            reason,
            recorded_at: Utc::now(),
        });
    }
}

fn check_version(entity: &str, expected: u64, loaded: u64) -> Result<()> {
    if expected == loaded {
        Ok(())
    } else {
        Err(MarketError::Conflict {
            entity: entity.to_string(),
        })
    }
}

#[allow(clippy::too_many_lines)]
fn stage_effect(inner: &Inner, staged: &mut Staged, effect: &LedgerEffect) -> Result<()> {
    match effect {
        LedgerEffect::ReservePoints {
            user_id,
            amount,
            expected_version,
            reason,
        } => {
            let (rec, loaded) = staged.balance(inner, *user_id);
            check_version("balance", *expected_version, *loaded)?;
            if rec.available < *amount {
                return Err(MarketError::InsufficientPoints {
                    required: *amount,
                    available: rec.available,
                });
            }
            rec.available -= amount;
            rec.reserved += amount;
            let available = rec.available;
            staged.record_audit(*user_id, -amount, available, *reason);
        }
        LedgerEffect::ReleasePoints {
            user_id,
            amount,
            expected_version,
            reason,
        } => {
            let (rec, loaded) = staged.balance(inner, *user_id);
            check_version("balance", *expected_version, *loaded)?;
            if rec.reserved < *amount {
                return Err(MarketError::InvariantViolation {
                    detail: format!(
                        "release of {amount} points exceeds reservation {} for {user_id}",
                        rec.reserved
                    ),
                });
            }
            rec.reserved -= amount;
            rec.available += amount;
            let available = rec.available;
            staged.record_audit(*user_id, *amount, available, *reason);
        }
        LedgerEffect::ConsumeReservedPoints {
            user_id,
            amount,
            expected_version,
            reason,
        } => {
            let (rec, loaded) = staged.balance(inner, *user_id);
            check_version("balance", *expected_version, *loaded)?;
            if rec.reserved < *amount {
                return Err(MarketError::InsufficientPoints {
                    required: *amount,
                    available: rec.reserved,
                });
            }
            rec.reserved -= amount;
            let available = rec.available;
            staged.record_audit(*user_id, -amount, available, *reason);
        }
        LedgerEffect::DebitPoints {
            user_id,
            amount,
            expected_version,
            reason,
        } => {
            let (rec, loaded) = staged.balance(inner, *user_id);
            check_version("balance", *expected_version, *loaded)?;
            if rec.available < *amount {
                return Err(MarketError::InsufficientPoints {
                    required: *amount,
                    available: rec.available,
                });
            }
            rec.available -= amount;
            let available = rec.available;
            staged.record_audit(*user_id, -amount, available, *reason);
        }
        LedgerEffect::CreditPoints {
            user_id,
            amount,
            expected_version,
            reason,
        } => {
            let (rec, loaded) = staged.balance(inner, *user_id);
            check_version("balance", *expected_version, *loaded)?;
            rec.available += amount;
            let available = rec.available;
            staged.record_audit(*user_id, *amount, available, *reason);
        }
        LedgerEffect::ReserveShares {
            user_id,
            symbol,
            qty,
            expected_version,
        } => {
            let (rec, loaded) = staged.position(inner, *user_id, symbol);
            check_version("position", *expected_version, *loaded)?;
            if rec.available < *qty {
                return Err(MarketError::InsufficientShares {
                    required: *qty,
                    available: rec.available,
                });
            }
            rec.available -= qty;
            rec.reserved += qty;
        }
        LedgerEffect::ReleaseShares {
            user_id,
            symbol,
            qty,
            expected_version,
        } => {
            let (rec, loaded) = staged.position(inner, *user_id, symbol);
            check_version("position", *expected_version, *loaded)?;
            if rec.reserved < *qty {
                return Err(MarketError::InvariantViolation {
                    detail: format!(
                        "release of {qty} shares exceeds reservation {} for {user_id}",
                        rec.reserved
                    ),
                });
            }
            rec.reserved -= qty;
            rec.available += qty;
        }
        LedgerEffect::ConsumeReservedShares {
            user_id,
            symbol,
            qty,
            expected_version,
        } => {
            let (rec, loaded) = staged.position(inner, *user_id, symbol);
            check_version("position", *expected_version, *loaded)?;
            if rec.reserved < *qty {
                return Err(MarketError::InsufficientShares {
                    required: *qty,
                    available: rec.reserved,
                });
            }
            rec.reserved -= qty;
        }
        LedgerEffect::CreditShares {
            user_id,
            symbol,
            qty,
            expected_version,
        } => {
            let (rec, loaded) = staged.position(inner, *user_id, symbol);
            check_version("position", *expected_version, *loaded)?;
            rec.available += qty;
        }
        LedgerEffect::ConsumeIpo {
            symbol,
            qty,
            expected_version,
        } => {
            let (rec, loaded) = staged.ipo(inner, symbol)?;
            check_version("ipo", *expected_version, *loaded)?;
            if rec.shares_remaining < *qty {
                return Err(MarketError::InvariantViolation {
                    detail: format!(
                        "IPO consume of {qty} exceeds remaining {}",
                        rec.shares_remaining
                    ),
                });
            }
            rec.shares_remaining -= qty;
        }
        LedgerEffect::ApplyFill {
            order_id,
            qty,
            expected_version,
        } => {
            let (order, loaded) = staged.order(inner, *order_id)?;
            check_version("order", *expected_version, *loaded)?;
            if !order.is_open() || order.remaining_qty < *qty || *qty <= 0 {
                return Err(MarketError::InvariantViolation {
                    detail: format!(
                        "fill of {qty} against order {order_id} ({}, remaining {})",
                        order.status, order.remaining_qty
                    ),
                });
            }
            order.remaining_qty -= qty;
            order.filled_qty += qty;
            order.status = if order.remaining_qty == 0 {
                OrderStatus::Filled
            } else {
                OrderStatus::Partial
            };
            order.updated_at = Utc::now();
        }
        LedgerEffect::TransitionOrder {
            order_id,
            to,
            expected_version,
        } => {
            let (order, loaded) = staged.order(inner, *order_id)?;
            check_version("order", *expected_version, *loaded)?;
            let legal = match to {
                OrderStatus::Cancelled => order.status.is_open(),
                OrderStatus::Pending => order.status == OrderStatus::PendingBand,
                _ => false,
            };
            if !legal {
                return Err(MarketError::InvariantViolation {
                    detail: format!("illegal transition {} -> {to} for {order_id}", order.status),
                });
            }
            order.status = *to;
            order.updated_at = Utc::now();
        }
        LedgerEffect::RecordTrade { trade } => {
            staged.trades.push(trade.clone());
        }
    }
    Ok(())
}

fn commit(inner: &mut Inner, staged: Staged) {
    for (user_id, (mut rec, loaded)) in staged.balances {
        rec.version = loaded + 1;
        inner.balances.insert(user_id, rec);
    }
    for (key, (mut rec, loaded)) in staged.positions {
        rec.version = loaded + 1;
        inner.positions.insert(key, rec);
    }
    for (order_id, (mut rec, loaded)) in staged.orders {
        rec.version = loaded + 1;
        inner.orders.insert(order_id, rec);
    }
    for (symbol, (mut rec, loaded)) in staged.ipos {
        rec.version = loaded + 1;
        inner.ipos.insert(symbol, rec);
    }
    inner.trades.extend(staged.trades);
    inner.audit.extend(staged.audit);
}

impl MemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn apply_group(&self, effects: &[LedgerEffect]) -> Result<()> {
        let mut inner = self.inner.lock().expect("ledger lock poisoned");
        let mut staged = Staged::default();
        for effect in effects {
            stage_effect(&inner, &mut staged, effect)?;
        }
        commit(&mut inner, staged);
        Ok(())
    }
}

impl LedgerStore for MemoryLedger {
    fn balance(&self, user_id: UserId) -> BalanceRecord {
        let inner = self.inner.lock().expect("ledger lock poisoned");
        inner.balances.get(&user_id).copied().unwrap_or_default()
    }

    fn position(&self, user_id: UserId, symbol: &Symbol) -> PositionRecord {
        let inner = self.inner.lock().expect("ledger lock poisoned");
        inner
            .positions
            .get(&(user_id, symbol.clone()))
            .copied()
            .unwrap_or_default()
    }

    fn order(&self, order_id: OrderId) -> Result<Order> {
        let inner = self.inner.lock().expect("ledger lock poisoned");
        inner
            .orders
            .get(&order_id)
            .cloned()
            .ok_or(MarketError::OrderNotFound(order_id))
    }

    fn open_orders(&self, symbol: &Symbol) -> Vec<Order> {
        let inner = self.inner.lock().expect("ledger lock poisoned");
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.symbol == *symbol && o.is_open())
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        orders
    }

    fn ipo(&self, symbol: &Symbol) -> Option<IpoInventory> {
        let inner = self.inner.lock().expect("ledger lock poisoned");
        inner.ipos.get(symbol).copied()
    }

    fn set_ipo(&self, symbol: Symbol, inventory: IpoInventory) {
        let mut inner = self.inner.lock().expect("ledger lock poisoned");
        inner.ipos.insert(symbol, inventory);
    }

    fn trades(&self, symbol: &Symbol) -> Vec<Trade> {
        let inner = self.inner.lock().expect("ledger lock poisoned");
        inner
            .trades
            .iter()
            .filter(|t| t.symbol == *symbol)
            .cloned()
            .collect()
    }

    fn audit_for_user(&self, user_id: UserId) -> Vec<AuditEntry> {
        let inner = self.inner.lock().expect("ledger lock poisoned");
        inner
            .audit
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect()
    }

    fn insert_order(&self, order: Order) -> Result<()> {
        if !matches!(
            order.status,
            OrderStatus::Pending | OrderStatus::PendingBand
        ) || order.remaining_qty != order.quantity
            || order.filled_qty != 0
        {
            return Err(MarketError::InvalidOrder {
                reason: format!("order {} not in a fresh state", order.id),
            });
        }
        let mut inner = self.inner.lock().expect("ledger lock poisoned");
        if inner.orders.contains_key(&order.id) {
            return Err(MarketError::DuplicateOrder(order.id));
        }
        inner.orders.insert(order.id, order);
        Ok(())
    }

    fn deposit_points(&self, user_id: UserId, amount: i64) -> Result<()> {
        if amount <= 0 {
            return Err(MarketError::Internal(format!(
                "deposit amount must be positive, got {amount}"
            )));
        }
        let mut inner = self.inner.lock().expect("ledger lock poisoned");
        let rec = inner.balances.entry(user_id).or_default();
        rec.available += amount;
        rec.version += 1;
        let available = rec.available;
        inner.audit.push(AuditEntry {
            user_id,
            amount,
            resulting_available: available,
            reason: AuditReason::Deposit,
            recorded_at: Utc::now(),
        });
        Ok(())
    }

    fn grant_shares(&self, user_id: UserId, symbol: Symbol, qty: i64) -> Result<()> {
        if qty <= 0 {
            return Err(MarketError::Internal(format!(
                "share grant must be positive, got {qty}"
            )));
        }
        let mut inner = self.inner.lock().expect("ledger lock poisoned");
        let rec = inner.positions.entry((user_id, symbol)).or_default();
        rec.available += qty;
        rec.version += 1;
        Ok(())
    }

    fn apply_atomic(&self, effects: &[LedgerEffect]) -> Result<()> {
        self.apply_group(effects)
    }

    fn apply_sequential(&self, effects: &[LedgerEffect]) -> Result<()> {
        for effect in effects {
            self.apply_group(std::slice::from_ref(effect))?;
        }
        Ok(())
    }
}
