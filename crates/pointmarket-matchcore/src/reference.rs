//! Reference price derivation.
//!
//! The basis for the price band is, in order of preference: the last trade
//! of the prior trading day, the first trade of the current day, or the
//! configured fallback. Derived per check, never stored.

use chrono::{DateTime, Utc};
use pointmarket_types::{MarketConfig, Trade};

/// Compute the reference price from trade history as of `now`.
///
/// `trades` must be in execution order, which is how the ledger returns
/// them.
#[must_use]
pub fn reference_price(trades: &[Trade], now: DateTime<Utc>, config: &MarketConfig) -> i64 {
    let midnight = midnight_utc(now);

    // Yesterday's close: the last trade strictly before today's midnight.
    if let Some(trade) = trades.iter().rev().find(|t| t.executed_at < midnight) {
        return trade.price;
    }

    // Else today's open: the first trade at or after midnight.
    if let Some(trade) = trades.iter().find(|t| t.executed_at >= midnight) {
        return trade.price;
    }

    config.fallback_price
}

fn midnight_utc(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map_or(now, |naive| naive.and_utc())
}
