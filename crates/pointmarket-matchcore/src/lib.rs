//! # pointmarket-matchcore
//!
//! Pure, re-derivable reads over ledger state: the price-ordered order
//! book (with the synthetic IPO ask injected), the reference price, and
//! the price-band gate. Nothing here mutates anything — the matching and
//! settlement crates own all writes.

pub mod band;
pub mod orderbook;
pub mod price_level;
pub mod reference;

pub use band::BandGate;
pub use orderbook::{BookLevel, BookSnapshot, OrderBook, crosses};
pub use price_level::PriceLevel;
pub use reference::reference_price;
