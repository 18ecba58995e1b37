//! Price band gate.
//!
//! An order priced outside `reference * (1 ± band)` is not rejected: it
//! rests in the book as `PendingBand` and re-admits the moment the
//! reference price or the band widens enough. The gate itself is a pure
//! predicate; re-checking happens at the start of every matching run.

use rust_decimal::Decimal;

/// Inclusive price band around a reference price.
#[derive(Debug, Clone, Copy)]
pub struct BandGate {
    reference: i64,
    band_pct: Decimal,
}

impl BandGate {
    #[must_use]
    pub fn new(reference: i64, band_pct: Decimal) -> Self {
        Self {
            reference,
            band_pct,
        }
    }

    #[must_use]
    pub fn reference(&self) -> i64 {
        self.reference
    }

    /// True iff `reference*(1-band) <= price <= reference*(1+band)`.
    #[must_use]
    pub fn allows(&self, price: i64) -> bool {
        let reference = Decimal::from(self.reference);
        let lower = reference * (Decimal::ONE - self.band_pct);
        let upper = reference * (Decimal::ONE + self.band_pct);
        let price = Decimal::from(price);
        lower <= price && price <= upper
    }
}
