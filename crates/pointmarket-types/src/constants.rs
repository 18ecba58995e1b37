//! System-wide constants for the pointmarket engine.

/// Reference price used when the market has no trade history.
pub const DEFAULT_FALLBACK_PRICE: i64 = 100;

/// Maximum conditional-update attempts before a retryable error surfaces.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 6;

/// Base delay for exponential backoff between retry attempts (milliseconds).
pub const DEFAULT_RETRY_BASE_MS: u64 = 10;

/// Periodic matching tick so band-held orders re-admit without activity
/// (milliseconds).
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 5_000;

/// Delay before re-queueing a matching run after a retryable failure
/// (milliseconds).
pub const DEFAULT_REQUEUE_DELAY_MS: u64 = 100;

/// Default depth of order-book snapshots.
pub const DEFAULT_BOOK_DEPTH: usize = 10;

/// Settlement duplicate-fill cache size (number of fill keys to remember).
pub const SETTLEMENT_IDEMPOTENCY_CACHE_SIZE: usize = 100_000;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "pointmarket";
