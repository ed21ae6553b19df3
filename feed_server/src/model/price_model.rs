//! Synthetic price model.
//!
//! A price is the instrument's base price scaled by a noise term made of two
//! slow sinusoids of wall-clock time, a uniform perturbation in a ±2% band and
//! a small per-symbol oscillation keyed on the symbol's first letter. The
//! model keeps no state; everything besides the instrument and the clock comes
//! from the supplied random source.
//!
//! Rounding to two decimals happens exactly once, when the `Quote` is built.

use crate::model::catalog::Instrument;
use chrono::{DateTime, Utc};
use feed_common::Quote;
use rand::Rng;

/// Half-width of the uniform perturbation band.
const RANDOM_BAND: f64 = 0.02;
/// Volume range, upper bound exclusive.
const VOLUME_RANGE: std::ops::Range<u64> = 100_000..10_000_000;

const TRILLION: f64 = 1_000_000_000_000.0;
const BILLION: f64 = 1_000_000_000.0;
const MILLION: f64 = 1_000_000.0;

/// Stateless quote generator.
pub struct PriceModel;

impl PriceModel {
    /// Quote for `instrument` at `now`, drawing randomness from the calling
    /// thread's generator.
    pub fn quote(instrument: &Instrument, now: DateTime<Utc>) -> Quote {
        Self::quote_with(instrument, now, &mut rand::rng())
    }

    /// Quote for `instrument` at `now` using `rng` as the only random source.
    ///
    /// Identical inputs and an identically seeded `rng` give an identical quote.
    pub fn quote_with<R: Rng + ?Sized>(
        instrument: &Instrument,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Quote {
        let seconds = now.timestamp_millis() as f64 / 1000.0;
        let symbol = instrument.ticker.to_string();

        let noise = Self::noise(&symbol, seconds, rng);
        let price = instrument.base_price * (1.0 + noise);
        let change = price - instrument.previous_close;
        let change_percent = change / instrument.previous_close * 100.0;

        let volume = rng.random_range(VOLUME_RANGE);
        let open = instrument.previous_close * (1.0 + rng.random_range(-0.005..0.005));
        let high = price * (1.0 + rng.random_range(0.0..0.01));
        let low = price * (1.0 - rng.random_range(0.0..0.01));

        Quote {
            symbol,
            company_name: instrument.name.to_string(),
            price: round2(price),
            change: round2(change),
            change_percent: round2(change_percent),
            volume,
            open: round2(open),
            high: round2(high),
            low: round2(low),
            previous_close: round2(instrument.previous_close),
            market_cap: format_market_cap(price * instrument.outstanding_shares as f64),
            timestamp: now.timestamp_millis().max(0) as u64,
        }
    }

    /// Relative deviation from the base price at `seconds`.
    ///
    /// Bounded by ±0.11, so the resulting price is always positive.
    pub fn noise<R: Rng + ?Sized>(symbol: &str, seconds: f64, rng: &mut R) -> f64 {
        let mut noise = seconds.sin() * 0.03
            + (seconds * 0.5).sin() * 0.02
            + rng.random_range(-RANDOM_BAND..RANDOM_BAND);

        noise += symbol_factor(symbol) * (seconds * 0.7).sin();
        noise
    }
}

/// Per-symbol amplitude in `0.00..=0.04`, derived from the first byte.
fn symbol_factor(symbol: &str) -> f64 {
    let first = symbol.bytes().next().unwrap_or(0);
    f64::from(first % 5) * 0.01
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Format a market capitalization with a magnitude suffix and two decimals.
///
/// Anything below a billion is expressed in millions.
pub fn format_market_cap(market_cap: f64) -> String {
    if market_cap >= TRILLION {
        format!("{:.2}T", market_cap / TRILLION)
    } else if market_cap >= BILLION {
        format!("{:.2}B", market_cap / BILLION)
    } else {
        format!("{:.2}M", market_cap / MILLION)
    }
}
