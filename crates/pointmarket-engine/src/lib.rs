//! # pointmarket-engine
//!
//! The active half of the market: the continuous matching engine walking
//! the book, the per-symbol scheduler that serializes runs, and the
//! service facade external collaborators call (place, cancel, book,
//! status).
//!
//! Composition follows the explicit-root rule: [`compose`] builds the one
//! scheduler instance and hands references down — no ambient globals.
//! `compose` must run inside a tokio runtime because the scheduler spawns
//! its worker tasks there.

use std::sync::{Arc, RwLock};

use pointmarket_ledger::LedgerStore;
use pointmarket_settlement::SettlementEngine;
use pointmarket_types::{IpoInventory, MarketConfig, SchedulerConfig};

pub mod matcher;
pub mod notify;
pub mod scheduler;
pub mod service;

pub use matcher::{MatchingEngine, fair_price};
pub use notify::{LogListener, NoopListener, TradeListener};
pub use scheduler::{MatchScheduler, MatchTrigger};
pub use service::{CancelReceipt, MarketService, OrderReceipt};

/// A fully wired market instance.
pub struct Market {
    pub ledger: Arc<dyn LedgerStore>,
    pub engine: Arc<MatchingEngine>,
    pub scheduler: Arc<MatchScheduler>,
    pub service: Arc<MarketService>,
}

/// Wire up ledger, settlement, matching, scheduler, and facade.
///
/// Seeds the IPO inventory from the config when `ipo_shares > 0`. Must be
/// called from within a tokio runtime.
#[must_use]
pub fn compose(
    config: MarketConfig,
    scheduler_config: SchedulerConfig,
    ledger: Arc<dyn LedgerStore>,
    listener: Arc<dyn TradeListener>,
) -> Market {
    if config.ipo_shares > 0 {
        ledger.set_ipo(
            config.symbol.clone(),
            IpoInventory::new(config.ipo_shares, config.ipo_unit_price),
        );
    }

    let shared_config = Arc::new(RwLock::new(config));
    let settlement = Arc::new(SettlementEngine::new(Arc::clone(&ledger)));
    let engine = Arc::new(MatchingEngine::new(
        Arc::clone(&ledger),
        settlement,
        Arc::clone(&shared_config),
        listener,
    ));
    let scheduler = MatchScheduler::spawn(Arc::clone(&engine), scheduler_config);
    let service = Arc::new(MarketService::new(
        Arc::clone(&ledger),
        Arc::clone(&scheduler) as Arc<dyn MatchTrigger>,
        shared_config,
    ));

    Market {
        ledger,
        engine,
        scheduler,
        service,
    }
}
