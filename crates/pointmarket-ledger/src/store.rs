//! The ledger store contract: versioned reads and conditional effects.

use pointmarket_types::{
    AuditEntry, AuditReason, BalanceRecord, IpoInventory, Order, OrderId, OrderStatus,
    PositionRecord, Result, Symbol, Trade, UserId,
};

/// One conditional mutation of a single ledger record.
///
/// `expected_version` is the version the caller observed when it read the
/// record; the store rejects the whole group with a conflict if the record
/// has moved since. Within one atomic group the expected version refers to
/// the record's state at group entry, so two effects touching the same
/// record may carry the same version.
#[derive(Debug, Clone)]
pub enum LedgerEffect {
    // --- points -----------------------------------------------------------
    /// Move points available → reserved (escrow for a new buy order).
    ReservePoints {
        user_id: UserId,
        amount: i64,
        expected_version: u64,
        reason: AuditReason,
    },
    /// Move points reserved → available (refund, price improvement).
    ReleasePoints {
        user_id: UserId,
        amount: i64,
        expected_version: u64,
        reason: AuditReason,
    },
    /// Consume reserved points to pay for a fill.
    ConsumeReservedPoints {
        user_id: UserId,
        amount: i64,
        expected_version: u64,
        reason: AuditReason,
    },
    /// Debit available points directly (market buys hold no escrow).
    DebitPoints {
        user_id: UserId,
        amount: i64,
        expected_version: u64,
        reason: AuditReason,
    },
    /// Credit available points (trade proceeds).
    CreditPoints {
        user_id: UserId,
        amount: i64,
        expected_version: u64,
        reason: AuditReason,
    },

    // --- shares -----------------------------------------------------------
    /// Move shares available → reserved (escrow for a new sell order).
    ReserveShares {
        user_id: UserId,
        symbol: Symbol,
        qty: i64,
        expected_version: u64,
    },
    /// Move shares reserved → available (cancel refund).
    ReleaseShares {
        user_id: UserId,
        symbol: Symbol,
        qty: i64,
        expected_version: u64,
    },
    /// Consume reserved shares to deliver a fill.
    ConsumeReservedShares {
        user_id: UserId,
        symbol: Symbol,
        qty: i64,
        expected_version: u64,
    },
    /// Credit shares to the tradable position (buyer side of a fill).
    CreditShares {
        user_id: UserId,
        symbol: Symbol,
        qty: i64,
        expected_version: u64,
    },

    // --- IPO inventory ----------------------------------------------------
    /// Consume shares from the virtual seller's inventory.
    ConsumeIpo {
        symbol: Symbol,
        qty: i64,
        expected_version: u64,
    },

    // --- orders -----------------------------------------------------------
    /// Apply a fill: `filled_qty += qty`, `remaining_qty -= qty`, status
    /// moves to `Partial` or `Filled`.
    ApplyFill {
        order_id: OrderId,
        qty: i64,
        expected_version: u64,
    },
    /// Explicit status transition: band re-admission
    /// (`PendingBand → Pending`) or cancellation (open → `Cancelled`).
    TransitionOrder {
        order_id: OrderId,
        to: OrderStatus,
        expected_version: u64,
    },

    // --- trades -----------------------------------------------------------
    /// Append one immutable trade record. Unconditional.
    RecordTrade { trade: Trade },
}

/// Persistent holder of balances, positions, orders, trades, and the IPO
/// inventory.
///
/// Reads return snapshots carrying the record's current version; writes are
/// expressed as [`LedgerEffect`] groups. Implementations handle their own
/// internal synchronization — callers never hold locks across calls.
pub trait LedgerStore: Send + Sync {
    /// Point balance for a user. Unknown users read as zero at version 0.
    fn balance(&self, user_id: UserId) -> BalanceRecord;

    /// Share position for a user. Unknown users read as zero at version 0.
    fn position(&self, user_id: UserId, symbol: &Symbol) -> PositionRecord;

    /// Fetch one order by id.
    fn order(&self, order_id: OrderId) -> Result<Order>;

    /// All orders for a symbol still participating in matching
    /// (`PendingBand`, `Pending`, `Partial`), sorted by creation time.
    fn open_orders(&self, symbol: &Symbol) -> Vec<Order>;

    /// The IPO inventory for a symbol, if one was seeded.
    fn ipo(&self, symbol: &Symbol) -> Option<IpoInventory>;

    /// Seed or replace the IPO inventory for a symbol.
    fn set_ipo(&self, symbol: Symbol, inventory: IpoInventory);

    /// Trade history for a symbol in execution order.
    fn trades(&self, symbol: &Symbol) -> Vec<Trade>;

    /// Audit trail for one user in append order.
    fn audit_for_user(&self, user_id: UserId) -> Vec<AuditEntry>;

    /// Persist a freshly constructed order.
    fn insert_order(&self, order: Order) -> Result<()>;

    /// Fund a user with points (writes an audit entry).
    fn deposit_points(&self, user_id: UserId, amount: i64) -> Result<()>;

    /// Grant tradable shares to a user.
    fn grant_shares(&self, user_id: UserId, symbol: Symbol, qty: i64) -> Result<()>;

    /// Whether [`LedgerStore::apply_atomic`] offers multi-record
    /// atomicity. Stores without transactions report `false` and callers
    /// degrade to [`LedgerStore::apply_sequential`].
    fn supports_atomic_apply(&self) -> bool {
        true
    }

    /// Apply a single effect through whichever path the store supports.
    fn apply_one(&self, effect: &LedgerEffect) -> Result<()> {
        if self.supports_atomic_apply() {
            self.apply_atomic(std::slice::from_ref(effect))
        } else {
            self.apply_sequential(std::slice::from_ref(effect))
        }
    }

    /// Apply a group of effects as one unit: every precondition is checked
    /// first and either all effects apply or none do.
    fn apply_atomic(&self, effects: &[LedgerEffect]) -> Result<()>;

    /// Apply effects one at a time, each still conditional. Best-effort:
    /// stops at the first failure, leaving earlier effects applied.
    fn apply_sequential(&self, effects: &[LedgerEffect]) -> Result<()>;
}
