//! Configuration for a market instance and its scheduler.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Symbol, constants};

/// Configuration of the single tradable instrument a service instance runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Ticker of the instrument.
    pub symbol: Symbol,
    /// Allowed price deviation around the reference price (e.g., `0.20`
    /// admits prices within ±20%).
    pub band_pct: Decimal,
    /// Reference price used when no trade history exists at all.
    pub fallback_price: i64,
    /// Shares seeded into the virtual IPO inventory at composition time.
    pub ipo_shares: i64,
    /// Offering price of the IPO inventory.
    pub ipo_unit_price: i64,
}

impl MarketConfig {
    /// Default configuration for the simulated points market.
    #[must_use]
    pub fn simulated_points() -> Self {
        Self {
            symbol: Symbol::new("PNTS"),
            band_pct: Decimal::new(20, 2), // ±20%
            fallback_price: constants::DEFAULT_FALLBACK_PRICE,
            ipo_shares: 0,
            ipo_unit_price: constants::DEFAULT_FALLBACK_PRICE,
        }
    }
}

/// Timing configuration for the matching scheduler.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Periodic re-trigger interval so band-held orders are re-admitted
    /// even without order activity.
    pub tick_interval_ms: u64,
    /// Delay before re-queueing a run that failed with a retryable error.
    pub requeue_delay_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: constants::DEFAULT_TICK_INTERVAL_MS,
            requeue_delay_ms: constants::DEFAULT_REQUEUE_DELAY_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_market_config() {
        let cfg = MarketConfig::simulated_points();
        assert_eq!(cfg.symbol.as_str(), "PNTS");
        assert_eq!(cfg.band_pct, Decimal::new(20, 2));
        assert!(cfg.fallback_price > 0);
    }

    #[test]
    fn scheduler_config_defaults() {
        let cfg = SchedulerConfig::default();
        assert_eq!(cfg.tick_interval_ms, 5_000);
        assert_eq!(cfg.requeue_delay_ms, 100);
    }

    #[test]
    fn market_config_serde_roundtrip() {
        let cfg = MarketConfig::simulated_points();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: MarketConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.symbol, back.symbol);
        assert_eq!(cfg.band_pct, back.band_pct);
        assert_eq!(cfg.fallback_price, back.fallback_price);
    }
}
