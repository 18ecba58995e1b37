//! End-to-end scenarios across facade, matching, settlement, and ledger.
//!
//! Matching runs inline behind the trigger seam so every placement is
//! followed deterministically by a full sweep, the way the scheduler
//! would do asynchronously.

use std::sync::{Arc, RwLock};

use pointmarket_engine::{MarketService, MatchTrigger, MatchingEngine, NoopListener};
use pointmarket_ledger::{LedgerStore, MemoryLedger};
use pointmarket_settlement::SettlementEngine;
use pointmarket_types::{
    IpoInventory, MarketConfig, MarketError, OrderKind, OrderSide, OrderStatus, Symbol, UserId,
};
use rust_decimal::Decimal;

fn sym() -> Symbol {
    Symbol::new("PNTS")
}

/// Runs a matching sweep synchronously on every trigger.
struct InlineTrigger {
    engine: Arc<MatchingEngine>,
    symbol: Symbol,
}

impl MatchTrigger for InlineTrigger {
    fn trigger(&self, symbol: &Symbol) {
        let _ = self.engine.run(symbol);
    }

    fn notify_config_changed(&self) {
        let _ = self.engine.run(&self.symbol);
    }
}

struct TestMarket {
    ledger: Arc<MemoryLedger>,
    service: MarketService,
    engine: Arc<MatchingEngine>,
}

fn market_with(config: MarketConfig) -> TestMarket {
    let ledger = Arc::new(MemoryLedger::new());
    if config.ipo_shares > 0 {
        ledger.set_ipo(
            config.symbol.clone(),
            IpoInventory::new(config.ipo_shares, config.ipo_unit_price),
        );
    }
    let store: Arc<dyn LedgerStore> = Arc::clone(&ledger) as Arc<dyn LedgerStore>;
    let symbol = config.symbol.clone();
    let shared_config = Arc::new(RwLock::new(config));
    let settlement = Arc::new(SettlementEngine::new(Arc::clone(&store)));
    let engine = Arc::new(MatchingEngine::new(
        Arc::clone(&store),
        settlement,
        Arc::clone(&shared_config),
        Arc::new(NoopListener),
    ));
    let trigger = Arc::new(InlineTrigger {
        engine: Arc::clone(&engine),
        symbol,
    });
    let service = MarketService::new(store, trigger, shared_config);
    TestMarket {
        ledger,
        service,
        engine,
    }
}

fn market() -> TestMarket {
    market_with(MarketConfig::simulated_points())
}

fn pause() {
    // Keeps created_at strictly increasing across placements so
    // price-setting time priority is deterministic.
    std::thread::sleep(std::time::Duration::from_millis(2));
}

#[test]
fn scenario_two_limit_orders_cross_at_the_bid_price() {
    let m = market();
    let alice = UserId::new();
    let bob = UserId::new();
    m.ledger.deposit_points(alice, 1_000).unwrap();
    m.ledger.grant_shares(bob, sym(), 10).unwrap();

    m.service
        .place_order(alice, &sym(), OrderSide::Buy, OrderKind::Limit, 5, Some(100))
        .unwrap();
    pause();
    m.service
        .place_order(bob, &sym(), OrderSide::Sell, OrderKind::Limit, 5, Some(100))
        .unwrap();

    let trades = m.ledger.trades(&sym());
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].quantity, 5);
    assert_eq!(trades[0].price, 100);
    assert_eq!(trades[0].amount, 500);

    assert_eq!(m.ledger.balance(alice).total(), 500);
    assert_eq!(m.ledger.position(alice, &sym()).total(), 5);
    assert_eq!(m.ledger.balance(bob).total(), 500);
    assert_eq!(m.ledger.position(bob, &sym()).total(), 5);
}

#[test]
fn scenario_market_buy_resolves_against_the_ipo() {
    let mut config = MarketConfig::simulated_points();
    config.ipo_shares = 100;
    config.ipo_unit_price = 20;
    let m = market_with(config);

    let carol = UserId::new();
    m.ledger.deposit_points(carol, 50).unwrap();

    m.service
        .place_order(carol, &sym(), OrderSide::Buy, OrderKind::Market, 2, None)
        .unwrap();

    let trades = m.ledger.trades(&sym());
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].price, 20);
    assert_eq!(trades[0].quantity, 2);
    assert!(trades[0].is_ipo());

    assert_eq!(m.ledger.ipo(&sym()).unwrap().shares_remaining, 98);
    assert_eq!(m.ledger.balance(carol).available, 10);
    assert_eq!(m.ledger.position(carol, &sym()).available, 2);
}

#[test]
fn scenario_band_widening_readmits_a_held_order() {
    let m = market();
    let buyer = UserId::new();
    let seller = UserId::new();
    m.ledger.deposit_points(buyer, 10_000).unwrap();
    m.ledger.grant_shares(seller, sym(), 10).unwrap();

    // Reference is the fallback 100; 130 violates the ±20% band.
    let held = m
        .service
        .place_order(buyer, &sym(), OrderSide::Buy, OrderKind::Limit, 5, Some(130))
        .unwrap();
    assert_eq!(held.status, OrderStatus::PendingBand);
    assert!(held.message.contains("waiting for price band"));

    // A crossing counter-order inside the band rests untouched.
    pause();
    m.service
        .place_order(seller, &sym(), OrderSide::Sell, OrderKind::Limit, 5, Some(120))
        .unwrap();
    assert!(m.ledger.trades(&sym()).is_empty());

    // Widening to ±40% promotes and matches on the next run.
    m.service.set_band_pct(Decimal::new(40, 2));

    let trades = m.ledger.trades(&sym());
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].quantity, 5);
    // The held bid is the earlier order, so it sets the price.
    assert_eq!(trades[0].price, 130);
    assert_eq!(
        m.service.order_status(held.order_id).unwrap().status,
        OrderStatus::Filled
    );
}

#[test]
fn scenario_oversized_sell_is_rejected_synchronously() {
    let m = market();
    let dave = UserId::new();
    m.ledger.grant_shares(dave, sym(), 3).unwrap();

    let err = m
        .service
        .place_order(dave, &sym(), OrderSide::Sell, OrderKind::Limit, 5, Some(100))
        .unwrap_err();
    assert!(matches!(
        err,
        MarketError::InsufficientShares {
            required: 5,
            available: 3
        }
    ));
    assert_eq!(m.ledger.position(dave, &sym()).total(), 3);
    assert!(m.ledger.open_orders(&sym()).is_empty());
}

#[test]
fn scenario_concurrent_sells_never_oversell() {
    let m = market();
    let user = UserId::new();
    m.ledger.grant_shares(user, sym(), 10).unwrap();

    let service = Arc::new(m.service);
    let barrier = Arc::new(std::sync::Barrier::new(2));
    let mut handles = Vec::new();
    for qty in [7i64, 6] {
        let service = Arc::clone(&service);
        let barrier = Arc::clone(&barrier);
        handles.push(std::thread::spawn(move || {
            barrier.wait();
            service.place_order(user, &sym(), OrderSide::Sell, OrderKind::Limit, qty, Some(100))
        }));
    }
    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("thread panicked"))
        .collect();

    let accepted: Vec<i64> = results
        .iter()
        .zip([7i64, 6])
        .filter(|(r, _)| r.is_ok())
        .map(|(_, qty)| qty)
        .collect();
    let rejected = results.iter().filter(|r| r.is_err()).count();

    assert_eq!(accepted.len(), 1, "exactly one sell may win");
    assert_eq!(rejected, 1);
    for result in &results {
        if let Err(err) = result {
            assert!(matches!(err, MarketError::InsufficientShares { .. }));
        }
    }

    let position = m.ledger.position(user, &sym());
    assert_eq!(position.reserved, accepted[0]);
    assert!(position.reserved <= 10);
    assert_eq!(position.total(), 10);
}

#[test]
fn scenario_cancelling_a_partial_buy_refunds_the_remainder() {
    let m = market();
    let buyer = UserId::new();
    let seller = UserId::new();
    m.ledger.deposit_points(buyer, 1_000).unwrap();
    m.ledger.grant_shares(seller, sym(), 10).unwrap();

    let buy = m
        .service
        .place_order(buyer, &sym(), OrderSide::Buy, OrderKind::Limit, 5, Some(100))
        .unwrap();
    pause();
    m.service
        .place_order(seller, &sym(), OrderSide::Sell, OrderKind::Limit, 3, Some(100))
        .unwrap();

    let order = m.service.order_status(buy.order_id).unwrap();
    assert_eq!(order.status, OrderStatus::Partial);
    assert_eq!(order.filled_qty, 3);
    assert_eq!(order.remaining_qty, 2);

    let cancel = m
        .service
        .cancel_order(buyer, buy.order_id, "done buying")
        .unwrap();
    assert!(cancel.cancelled);

    // Refund is exactly remaining * price, not the original escrow.
    let balance = m.ledger.balance(buyer);
    assert_eq!(balance.reserved, 0);
    assert_eq!(balance.available, 700);
    assert_eq!(balance.total(), 1_000 - 300);
}

#[test]
fn rerunning_an_uncrossed_book_stays_a_no_op() {
    let m = market();
    let buyer = UserId::new();
    let seller = UserId::new();
    m.ledger.deposit_points(buyer, 1_000).unwrap();
    m.ledger.grant_shares(seller, sym(), 10).unwrap();

    m.service
        .place_order(buyer, &sym(), OrderSide::Buy, OrderKind::Limit, 2, Some(90))
        .unwrap();
    m.service
        .place_order(seller, &sym(), OrderSide::Sell, OrderKind::Limit, 2, Some(110))
        .unwrap();

    for _ in 0..5 {
        assert!(m.engine.run(&sym()).unwrap().is_empty());
    }
    assert!(m.ledger.trades(&sym()).is_empty());
    assert_eq!(m.ledger.balance(buyer).reserved, 180);
}

#[test]
fn fills_never_pair_a_user_with_itself() {
    let m = market();
    let user = UserId::new();
    let other = UserId::new();
    m.ledger.deposit_points(user, 10_000).unwrap();
    m.ledger.grant_shares(user, sym(), 10).unwrap();
    m.ledger.grant_shares(other, sym(), 10).unwrap();

    m.service
        .place_order(user, &sym(), OrderSide::Sell, OrderKind::Limit, 5, Some(100))
        .unwrap();
    pause();
    m.service
        .place_order(other, &sym(), OrderSide::Sell, OrderKind::Limit, 5, Some(100))
        .unwrap();
    pause();
    m.service
        .place_order(user, &sym(), OrderSide::Buy, OrderKind::Limit, 5, Some(100))
        .unwrap();

    let trades = m.ledger.trades(&sym());
    assert_eq!(trades.len(), 1);
    for trade in &trades {
        assert_ne!(Some(trade.buyer_id), trade.seller_id);
    }
    assert_eq!(trades[0].seller_id, Some(other));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn composed_market_matches_through_the_scheduler() {
    let mut config = MarketConfig::simulated_points();
    config.ipo_shares = 100;
    config.ipo_unit_price = 20;
    let market = pointmarket_engine::compose(
        config,
        pointmarket_types::SchedulerConfig {
            tick_interval_ms: 60_000,
            requeue_delay_ms: 10,
        },
        Arc::new(MemoryLedger::new()) as Arc<dyn LedgerStore>,
        Arc::new(NoopListener),
    );

    let carol = UserId::new();
    market.ledger.deposit_points(carol, 50).unwrap();
    market
        .service
        .place_order(carol, &sym(), OrderSide::Buy, OrderKind::Market, 2, None)
        .unwrap();

    // Placement returns before matching; the worker settles shortly after.
    for _ in 0..100 {
        if !market.ledger.trades(&sym()).is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let trades = market.ledger.trades(&sym());
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].price, 20);
    assert_eq!(market.ledger.ipo(&sym()).unwrap().shares_remaining, 98);
}

#[test]
fn depth_snapshot_reflects_resting_orders() {
    let mut config = MarketConfig::simulated_points();
    config.ipo_shares = 50;
    config.ipo_unit_price = 90;
    let m = market_with(config);

    let buyer = UserId::new();
    m.ledger.deposit_points(buyer, 10_000).unwrap();
    m.service
        .place_order(buyer, &sym(), OrderSide::Buy, OrderKind::Limit, 3, Some(85))
        .unwrap();
    m.service
        .place_order(buyer, &sym(), OrderSide::Buy, OrderKind::Limit, 2, Some(85))
        .unwrap();

    let snapshot = m.service.order_book(&sym(), 5).unwrap();
    assert_eq!(snapshot.bids.len(), 1);
    assert_eq!(snapshot.bids[0].quantity, 5);
    assert_eq!(snapshot.bids[0].order_count, 2);
    assert_eq!(snapshot.asks[0].price, 90);
    assert_eq!(snapshot.asks[0].quantity, 50);
}
