//! Matching scheduler: decouples "an order changed" from "a sweep runs".
//!
//! One worker task per symbol consumes a capacity-1 trigger channel, so
//! at most one run per symbol executes at a time and bursts of triggers
//! while a run is pending coalesce into a single follow-up run. A
//! periodic tick re-triggers every known symbol so band-held orders
//! re-admit even without order activity.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pointmarket_types::{SchedulerConfig, Symbol};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::matcher::MatchingEngine;

/// The seam the facade kicks after placements, cancels, and config
/// changes. Production uses [`MatchScheduler`]; tests may run matching
/// inline.
pub trait MatchTrigger: Send + Sync {
    /// Request a matching run for one symbol.
    fn trigger(&self, symbol: &Symbol);
    /// Band or reference inputs changed: re-run every symbol.
    fn notify_config_changed(&self);
}

/// Per-symbol single-worker scheduler backed by tokio tasks.
pub struct MatchScheduler {
    engine: Arc<MatchingEngine>,
    config: SchedulerConfig,
    workers: Mutex<HashMap<Symbol, mpsc::Sender<()>>>,
}

impl MatchScheduler {
    /// Create the scheduler and start its periodic tick. Must be called
    /// from within a tokio runtime.
    #[must_use]
    pub fn spawn(engine: Arc<MatchingEngine>, config: SchedulerConfig) -> Arc<Self> {
        let scheduler = Arc::new(Self {
            engine,
            config,
            workers: Mutex::new(HashMap::new()),
        });

        // The tick holds only a weak handle so dropping the scheduler
        // stops the loop.
        let weak = Arc::downgrade(&scheduler);
        let tick_interval = Duration::from_millis(config.tick_interval_ms.max(1));
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(tick_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tick.tick().await;
                let Some(scheduler) = weak.upgrade() else { break };
                scheduler.trigger_all();
            }
        });

        scheduler
    }

    /// Request a run for `symbol`, starting its worker on first use.
    /// Multiple triggers while a run is pending collapse into one.
    pub fn trigger(&self, symbol: &Symbol) {
        let mut workers = self.workers.lock().expect("scheduler lock poisoned");
        let sender = workers.entry(symbol.clone()).or_insert_with(|| {
            Self::spawn_worker(Arc::clone(&self.engine), symbol.clone(), self.config)
        });
        // A full channel means a run is already queued — coalesce.
        let _ = sender.try_send(());
    }

    /// Re-trigger every symbol that has ever been active.
    pub fn trigger_all(&self) {
        let workers = self.workers.lock().expect("scheduler lock poisoned");
        for sender in workers.values() {
            let _ = sender.try_send(());
        }
    }

    fn spawn_worker(
        engine: Arc<MatchingEngine>,
        symbol: Symbol,
        config: SchedulerConfig,
    ) -> mpsc::Sender<()> {
        let (sender, mut receiver) = mpsc::channel::<()>(1);
        let requeue = sender.clone();
        tokio::spawn(async move {
            while receiver.recv().await.is_some() {
                let run_engine = Arc::clone(&engine);
                let run_symbol = symbol.clone();
                let outcome =
                    tokio::task::spawn_blocking(move || run_engine.run(&run_symbol)).await;
                match outcome {
                    Ok(Ok(trades)) => {
                        if !trades.is_empty() {
                            tracing::debug!(
                                symbol = %symbol,
                                trades = trades.len(),
                                "matching run settled trades"
                            );
                        }
                    }
                    Ok(Err(err)) if err.is_retryable() => {
                        tracing::warn!(symbol = %symbol, error = %err, "matching run re-queued");
                        tokio::time::sleep(Duration::from_millis(config.requeue_delay_ms)).await;
                        let _ = requeue.try_send(());
                    }
                    Ok(Err(err)) => {
                        tracing::error!(symbol = %symbol, error = %err, "matching run failed");
                    }
                    Err(join_err) => {
                        tracing::error!(symbol = %symbol, error = %join_err, "matching run panicked");
                    }
                }
            }
        });
        sender
    }
}

impl MatchTrigger for MatchScheduler {
    fn trigger(&self, symbol: &Symbol) {
        Self::trigger(self, symbol);
    }

    fn notify_config_changed(&self) {
        self.trigger_all();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::RwLock;

    use pointmarket_ledger::{LedgerEffect, LedgerStore, MemoryLedger};
    use pointmarket_settlement::SettlementEngine;
    use pointmarket_types::{
        AuditReason, MarketConfig, Order, OrderSide, UserId,
    };

    use crate::notify::NoopListener;

    use super::*;

    fn sym() -> Symbol {
        Symbol::new("PNTS")
    }

    fn place_crossing_pair(ledger: &MemoryLedger) {
        let buyer = UserId::new();
        let seller = UserId::new();
        ledger.deposit_points(buyer, 1_000).unwrap();
        ledger.grant_shares(seller, sym(), 10).unwrap();

        let buy = Order::limit(buyer, sym(), OrderSide::Buy, 5, 100).unwrap();
        ledger
            .apply_one(&LedgerEffect::ReservePoints {
                user_id: buyer,
                amount: 500,
                expected_version: ledger.balance(buyer).version,
                reason: AuditReason::OrderReserve,
            })
            .unwrap();
        ledger.insert_order(buy).unwrap();

        let sell = Order::limit(seller, sym(), OrderSide::Sell, 5, 100).unwrap();
        ledger
            .apply_one(&LedgerEffect::ReserveShares {
                user_id: seller,
                symbol: sym(),
                qty: 5,
                expected_version: ledger.position(seller, &sym()).version,
            })
            .unwrap();
        ledger.insert_order(sell).unwrap();
    }

    fn build_engine(ledger: &Arc<MemoryLedger>) -> Arc<MatchingEngine> {
        let store: Arc<dyn LedgerStore> = Arc::clone(ledger) as Arc<dyn LedgerStore>;
        let settlement = Arc::new(SettlementEngine::new(Arc::clone(&store)));
        Arc::new(MatchingEngine::new(
            store,
            settlement,
            Arc::new(RwLock::new(MarketConfig::simulated_points())),
            Arc::new(NoopListener),
        ))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn trigger_runs_matching_asynchronously() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let ledger = Arc::new(MemoryLedger::new());
        place_crossing_pair(&ledger);

        let scheduler = MatchScheduler::spawn(
            build_engine(&ledger),
            SchedulerConfig {
                tick_interval_ms: 60_000,
                requeue_delay_ms: 10,
            },
        );
        scheduler.trigger(&sym());

        // The caller is not blocked on the sweep; poll for its effect.
        for _ in 0..100 {
            if !ledger.trades(&sym()).is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(ledger.trades(&sym()).len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn burst_of_triggers_coalesces() {
        let ledger = Arc::new(MemoryLedger::new());
        place_crossing_pair(&ledger);

        let scheduler = MatchScheduler::spawn(
            build_engine(&ledger),
            SchedulerConfig {
                tick_interval_ms: 60_000,
                requeue_delay_ms: 10,
            },
        );
        for _ in 0..50 {
            scheduler.trigger(&sym());
        }

        for _ in 0..100 {
            if !ledger.trades(&sym()).is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // However many runs actually fired, the book only crossed once.
        assert_eq!(ledger.trades(&sym()).len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn periodic_tick_retriggers_known_symbols() {
        let ledger = Arc::new(MemoryLedger::new());

        let scheduler = MatchScheduler::spawn(
            build_engine(&ledger),
            SchedulerConfig {
                tick_interval_ms: 20,
                requeue_delay_ms: 10,
            },
        );
        // Make the symbol known with an empty-book run.
        scheduler.trigger(&sym());
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Orders placed with no further trigger still match on the tick.
        place_crossing_pair(&ledger);
        for _ in 0..100 {
            if !ledger.trades(&sym()).is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(ledger.trades(&sym()).len(), 1);
    }
}
