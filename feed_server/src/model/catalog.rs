//! Static instrument catalog.
//!
//! The catalog is built once at startup and shared read-only (behind `Arc`) by
//! the scheduler, the unary handlers and the poll loops. It is the single
//! authority on which symbols exist: every lookup coming from a client goes
//! through [`Catalog::resolve`] or [`Catalog::resolve_all`].

use feed_common::tickers::normalize;
use feed_common::{FeedError, Result, Ticker};

/// Share count used when an instrument does not specify one.
pub const DEFAULT_OUTSTANDING_SHARES: u64 = 1_000_000_000;

/// Immutable reference data for one tradable instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    /// Unique key.
    pub ticker: Ticker,
    /// Display name.
    pub name: &'static str,
    /// Reference price the price model oscillates around.
    pub base_price: f64,
    /// Close of the previous session.
    pub previous_close: f64,
    /// Outstanding shares, used for the market capitalization.
    pub outstanding_shares: u64,
}

impl Instrument {
    /// Instrument with the default share count.
    pub const fn new(
        ticker: Ticker,
        name: &'static str,
        base_price: f64,
        previous_close: f64,
    ) -> Self {
        Self {
            ticker,
            name,
            base_price,
            previous_close,
            outstanding_shares: DEFAULT_OUTSTANDING_SHARES,
        }
    }
}

/// Ordered, immutable table of instruments.
#[derive(Debug, Clone)]
pub struct Catalog {
    instruments: Vec<Instrument>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(vec![
            Instrument::new(Ticker::AAPL, "Apple Inc.", 175.50, 173.75),
            Instrument::new(Ticker::GOOGL, "Alphabet Inc.", 134.25, 133.20),
            Instrument::new(Ticker::MSFT, "Microsoft Corporation", 325.80, 323.50),
            Instrument::new(Ticker::AMZN, "Amazon.com, Inc.", 128.90, 127.15),
            Instrument::new(Ticker::TSLA, "Tesla, Inc.", 245.75, 242.30),
        ])
    }
}

impl Catalog {
    /// Build a catalog from `instruments`; later duplicates of a ticker are ignored.
    pub fn new(instruments: Vec<Instrument>) -> Self {
        let mut unique: Vec<Instrument> = Vec::with_capacity(instruments.len());
        for instrument in instruments {
            if !unique.iter().any(|i| i.ticker == instrument.ticker) {
                unique.push(instrument);
            }
        }
        Self { instruments: unique }
    }

    /// Instruments in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments.iter()
    }

    /// Tickers in catalog order.
    pub fn tickers(&self) -> Vec<Ticker> {
        self.instruments.iter().map(|i| i.ticker).collect()
    }

    /// Symbols in catalog order. Stable for the life of the catalog.
    pub fn symbols(&self) -> Vec<String> {
        self.instruments.iter().map(|i| i.ticker.to_string()).collect()
    }

    /// Number of instruments.
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    /// Whether the catalog has no instruments.
    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Instrument for an already-parsed ticker.
    pub fn get(&self, ticker: Ticker) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.ticker == ticker)
    }

    /// Resolve a case-insensitive client symbol.
    ///
    /// Fails with `FeedError::NotFound` if the symbol is not in this catalog.
    pub fn resolve(&self, symbol: &str) -> Result<&Instrument> {
        let ticker = Ticker::resolve(symbol)?;
        self.get(ticker)
            .ok_or_else(|| FeedError::NotFound(normalize(symbol)))
    }

    /// Resolve every symbol of a multi-symbol request, keeping request order and
    /// dropping repeats.
    ///
    /// If any symbol is unknown nothing is returned: the call fails with
    /// `FeedError::InvalidArgument` listing exactly the unknown symbols.
    pub fn resolve_all<S: AsRef<str>>(&self, symbols: &[S]) -> Result<Vec<Ticker>> {
        let mut tickers = Vec::with_capacity(symbols.len());
        let mut unknown: Vec<String> = Vec::new();

        for symbol in symbols {
            match self.resolve(symbol.as_ref()) {
                Ok(instrument) => {
                    if !tickers.contains(&instrument.ticker) {
                        tickers.push(instrument.ticker);
                    }
                }
                Err(_) => {
                    let normalized = normalize(symbol.as_ref());
                    if !unknown.contains(&normalized) {
                        unknown.push(normalized);
                    }
                }
            }
        }

        if unknown.is_empty() {
            Ok(tickers)
        } else {
            Err(FeedError::InvalidArgument(unknown))
        }
    }
}
