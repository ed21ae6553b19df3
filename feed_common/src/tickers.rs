//! Ticker symbols and helpers shared between client and server.
//!
//! `Ticker` is the closed set of symbols the feed knows about. Parsing is
//! ASCII-case-insensitive, so `"aapl"`, `" AAPL "` and `"Aapl"` all resolve to
//! `Ticker::AAPL`; anything else is reported back with its normalized
//! (trimmed, uppercase) spelling.

use std::io::BufRead;
use strum_macros::{Display, EnumIter, EnumString};

use crate::error::FeedError;

/// Trait providing file parsing for tickers.
pub trait TickerParser {
    /// Parses tickers from a buffered reader.
    ///
    /// Symbols may be separated by commas, spaces, or new lines. Returns an
    /// error if any entry cannot be parsed.
    fn parse_from_file<R: BufRead>(reader: R) -> Result<Vec<Ticker>, FeedError>;
}

impl TickerParser for Ticker {
    fn parse_from_file<R: BufRead>(reader: R) -> Result<Vec<Self>, FeedError> {
        let mut tickers = Vec::new();

        for line_result in reader.lines() {
            let line = line_result.map_err(FeedError::Io)?;
            for entry in line.split(|c: char| c == ',' || c.is_whitespace()) {
                if entry.is_empty() {
                    continue;
                }
                match entry.parse::<Self>() {
                    Ok(ticker) => tickers.push(ticker),
                    Err(e) => {
                        return Err(FeedError::ParseTickersFile(format!("{}: {}", entry, e)));
                    }
                }
            }
        }
        Ok(tickers)
    }
}

/// Set of supported ticker symbols.
#[allow(missing_docs)]
#[derive(
    Debug,
    Clone,
    Copy,
    Display,
    EnumString,
    EnumIter,
    Hash,
    Eq,
    PartialEq,
)]
#[strum(ascii_case_insensitive)]
pub enum Ticker {
    AAPL,
    GOOGL,
    MSFT,
    AMZN,
    TSLA,
}

/// Trim and uppercase a client-provided symbol.
pub fn normalize(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

impl Ticker {
    /// Resolve a single client-provided symbol.
    ///
    /// Fails with `FeedError::NotFound` carrying the normalized symbol.
    pub fn resolve(symbol: &str) -> Result<Ticker, FeedError> {
        symbol
            .trim()
            .parse::<Ticker>()
            .map_err(|_| FeedError::NotFound(normalize(symbol)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use strum::IntoEnumIterator;

    #[test]
    fn resolve_is_case_insensitive() {
        assert_eq!(Ticker::resolve("aapl").unwrap(), Ticker::AAPL);
        assert_eq!(Ticker::resolve(" Googl ").unwrap(), Ticker::GOOGL);
    }

    #[test]
    fn resolve_unknown_is_not_found() {
        match Ticker::resolve("zzzz") {
            Err(FeedError::NotFound(symbol)) => assert_eq!(symbol, "ZZZZ"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn parse_from_file_accepts_mixed_separators() {
        let input = Cursor::new("AAPL, msft\n\nTSLA GOOGL\n");
        let tickers = Ticker::parse_from_file(input).unwrap();
        assert_eq!(
            tickers,
            vec![Ticker::AAPL, Ticker::MSFT, Ticker::TSLA, Ticker::GOOGL]
        );
    }

    #[test]
    fn parse_from_file_rejects_unknown() {
        let input = Cursor::new("AAPL\nNOPE\n");
        assert!(matches!(
            Ticker::parse_from_file(input),
            Err(FeedError::ParseTickersFile(_))
        ));
    }

    #[test]
    fn display_round_trips_through_parse() {
        for ticker in Ticker::iter() {
            assert_eq!(ticker.to_string().parse::<Ticker>().unwrap(), ticker);
        }
    }
}
