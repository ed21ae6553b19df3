//! Quote payload shared by server and client.
//!
//! A `Quote` is produced by the server's price model once per instrument per
//! tick (or per poll/unary request) and travels to clients inside a JSON
//! `Frame`. Every price-like field is already rounded to two decimals.

use serde::{Deserialize, Serialize};

/// Market quote for a single ticker symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Symbol identifier (string form of `Ticker`).
    pub symbol: String,
    /// Display name of the instrument.
    pub company_name: String,
    /// Current price.
    pub price: f64,
    /// Absolute change against the previous close.
    pub change: f64,
    /// Change against the previous close, in percent.
    pub change_percent: f64,
    /// Synthetic trade volume associated with this tick.
    pub volume: u64,
    /// Intraday open.
    pub open: f64,
    /// Intraday high.
    pub high: f64,
    /// Intraday low.
    pub low: f64,
    /// Previous session close.
    pub previous_close: f64,
    /// Market capitalization with a `T`/`B`/`M` suffix, e.g. `"175.50B"`.
    pub market_cap: String,
    /// UTC timestamp in milliseconds since Unix epoch.
    pub timestamp: u64,
}
