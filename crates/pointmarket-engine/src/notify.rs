//! Outbound trade notification hook.
//!
//! Fired after a settlement commits. The delivering collaborator
//! (Telegram, email, websocket fan-out) lives outside this workspace; a
//! listener must never be able to roll a trade back, so the hook takes a
//! committed trade by reference and returns nothing.

use pointmarket_types::Trade;

/// Receiver of executed-trade events.
pub trait TradeListener: Send + Sync {
    fn on_trade_executed(&self, trade: &Trade);
}

/// Listener that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl TradeListener for NoopListener {
    fn on_trade_executed(&self, _trade: &Trade) {}
}

/// Listener that logs each trade at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogListener;

impl TradeListener for LogListener {
    fn on_trade_executed(&self, trade: &Trade) {
        tracing::info!(
            trade_id = %trade.id,
            symbol = %trade.symbol,
            buyer = %trade.buyer_id,
            seller = %trade.seller_name(),
            price = trade.price,
            quantity = trade.quantity,
            "trade executed"
        );
    }
}
