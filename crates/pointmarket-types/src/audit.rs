//! Append-only audit log entries for balance mutations.
//!
//! Every ledger effect that moves points writes one entry: the signed
//! change, the resulting available balance, and why.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Why a balance changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditReason {
    /// External funding of the account.
    Deposit,
    /// Points escrowed for a new buy order.
    OrderReserve,
    /// Escrow released without a trade (price improvement or rejection).
    OrderRelease,
    /// Escrowed points consumed to pay for a fill.
    TradePayment,
    /// Points received for a fill.
    TradeProceeds,
    /// Un-filled escrow returned on cancellation.
    CancelRefund,
}

impl std::fmt::Display for AuditReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deposit => write!(f, "DEPOSIT"),
            Self::OrderReserve => write!(f, "ORDER_RESERVE"),
            Self::OrderRelease => write!(f, "ORDER_RELEASE"),
            Self::TradePayment => write!(f, "TRADE_PAYMENT"),
            Self::TradeProceeds => write!(f, "TRADE_PROCEEDS"),
            Self::CancelRefund => write!(f, "CANCEL_REFUND"),
        }
    }
}

/// One append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub user_id: UserId,
    /// Signed change to the available balance.
    pub amount: i64,
    /// Available balance after the change.
    pub resulting_available: i64,
    pub reason: AuditReason,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_display() {
        assert_eq!(format!("{}", AuditReason::Deposit), "DEPOSIT");
        assert_eq!(format!("{}", AuditReason::TradePayment), "TRADE_PAYMENT");
        assert_eq!(format!("{}", AuditReason::CancelRefund), "CANCEL_REFUND");
    }

    #[test]
    fn entry_serde_roundtrip() {
        let entry = AuditEntry {
            user_id: UserId::new(),
            amount: -500,
            resulting_available: 500,
            reason: AuditReason::OrderReserve,
            recorded_at: Utc::now(),
        };
        let json = serde_json::to_string(&entry).unwrap();
        let back: AuditEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.amount, -500);
        assert_eq!(back.reason, AuditReason::OrderReserve);
    }
}
