//! Latest broadcast quote per symbol.
//!
//! The scheduler records every quote it broadcasts; unary lookups read from
//! here so that a `get` issued during a tick sees the same price, volume and
//! open/high/low that subscribers received for that tick.

use feed_common::{Quote, Result, Ticker};
use std::collections::HashMap;
use std::sync::RwLock;

/// Last quote produced per symbol.
#[derive(Default)]
pub struct QuoteBook {
    latest: RwLock<HashMap<Ticker, Quote>>,
}

impl QuoteBook {
    /// Empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the latest quote for `ticker`.
    pub fn record(&self, ticker: Ticker, quote: Quote) -> Result<()> {
        self.latest.write()?.insert(ticker, quote);
        Ok(())
    }

    /// Latest quote for `ticker`, if one was recorded.
    pub fn latest(&self, ticker: Ticker) -> Result<Option<Quote>> {
        Ok(self.latest.read()?.get(&ticker).cloned())
    }

    /// Latest quote for `ticker` if it is no older than `max_age_ms` at `now_ms`.
    pub fn fresh(&self, ticker: Ticker, now_ms: u64, max_age_ms: u64) -> Result<Option<Quote>> {
        Ok(self
            .latest(ticker)?
            .filter(|q| now_ms.saturating_sub(q.timestamp) <= max_age_ms))
    }
}
