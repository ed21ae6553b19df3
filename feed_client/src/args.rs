//! Command-line arguments for the feed client.
//!
//! This module defines the CLI interface using `clap`. See `main` for end-to-end usage.
use clap::{Parser, Subcommand};

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Feed server address as `host:port`.
    #[clap(long, default_value = "127.0.0.1:8080")]
    pub server: String,

    /// What to ask the server for.
    #[command(subcommand)]
    pub action: Action,
}

/// Client operations.
#[derive(Debug, Subcommand)]
pub enum Action {
    /// Print the current quote of one symbol.
    Get {
        /// Symbol, case-insensitive.
        symbol: String,
    },
    /// Print every symbol the server knows.
    List,
    /// Stream broadcast quotes until Ctrl+C.
    Stream(Selection),
    /// Receive per-connection snapshots until Ctrl+C.
    Poll(Selection),
}

/// Symbols for `stream` and `poll`. None at all means every symbol.
#[derive(Debug, clap::Args)]
pub struct Selection {
    /// Symbols, case-insensitive.
    pub symbols: Vec<String>,

    /// Path to a text file with tickers.
    /// Tickers may be separated by commas, spaces, or new lines.
    #[clap(long)]
    pub path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_takes_symbols_and_a_file() {
        let args = Args::parse_from(["feed_client", "stream", "aapl", "tsla", "--path", "t.txt"]);
        assert_eq!(args.server, "127.0.0.1:8080");
        match args.action {
            Action::Stream(selection) => {
                assert_eq!(selection.symbols, vec!["aapl", "tsla"]);
                assert_eq!(selection.path.as_deref(), Some("t.txt"));
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn server_flag_precedes_the_subcommand() {
        let args = Args::parse_from(["feed_client", "--server", "10.0.0.2:9000", "get", "msft"]);
        assert_eq!(args.server, "10.0.0.2:9000");
        assert!(matches!(args.action, Action::Get { symbol } if symbol == "msft"));
    }
}
