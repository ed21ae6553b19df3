//! Feed Client — a TCP client for the quote feed server. It looks up single
//! quotes, lists the catalog, or opens a stream of broadcast quotes (or
//! per-connection snapshots) and prints every received quote.
//!
//! Usage example (CLI):
//! ```bash
//! feed_client --server 127.0.0.1:8080 get aapl
//! feed_client list
//! feed_client stream AAPL TSLA
//! feed_client poll --path ./tickers.txt
//! ```
//!
//! The ticker file should contain symbols separated by commas, spaces, or new lines.
//! Ctrl+C on an open stream sends `unsubscribe` and the client exits once the
//! server closes the connection.
#![warn(missing_docs)]
mod args;
mod sender;

use crate::args::{Action, Args, Selection};
use crate::sender::{FeedConnection, send_command};
use chrono::DateTime;
use clap::Parser;
use feed_common::tickers::TickerParser;
use feed_common::{Command, FeedError, Frame, Quote, Result, Ticker};
use log::{error, info, warn};
use std::fs::File;
use std::io::BufReader;
use std::net::Shutdown;
use std::path::PathBuf;

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();
    let mut connection = FeedConnection::connect(args.server.trim())?;

    match args.action {
        Action::Get { symbol } => {
            connection.send(&Command::Get { symbol })?;
            match expect_frame(&mut connection)? {
                Frame::Quote { quote } => print_quote(&quote),
                other => return Err(unexpected(other)),
            }
        }
        Action::List => {
            connection.send(&Command::List)?;
            match expect_frame(&mut connection)? {
                Frame::Symbols { symbols } => info!("SYMBOLS: {}", symbols.join(", ")),
                other => return Err(unexpected(other)),
            }
        }
        Action::Stream(selection) => {
            let symbols = selected_symbols(selection)?;
            let command = match symbols.as_slice() {
                [symbol] => Command::Subscribe {
                    symbol: symbol.clone(),
                },
                _ => Command::SubscribeMany { symbols },
            };
            stream(connection, &command)?;
        }
        Action::Poll(selection) => {
            let symbols = selected_symbols(selection)?;
            stream(connection, &Command::Poll { symbols })?;
        }
    }
    Ok(())
}

/// Send a streaming command and print updates until the server closes.
fn stream(mut connection: FeedConnection, command: &Command) -> Result<()> {
    let mut control = connection.try_clone_stream()?;
    ctrlc::set_handler(move || {
        info!("Ctrl+C received. Unsubscribing...");
        if let Err(e) = send_command(&mut control, &Command::Unsubscribe) {
            warn!("Could not send unsubscribe: {}", e);
            let _ = control.shutdown(Shutdown::Both);
        }
    })
    .map_err(|e| FeedError::Format(format!("Error setting Ctrl+C handler: {}", e)))?;

    connection.send(command)?;
    info!("Client is running. Press Ctrl+C to exit.");

    let mut received = 0usize;
    while let Some(frame) = connection.next_frame()? {
        match frame {
            Frame::Subscribed { symbols } => info!("Subscribed to {}", symbols.join(", ")),
            Frame::Update { quote } => {
                received += 1;
                print_quote(&quote);
            }
            other => return Err(unexpected(other)),
        }
    }
    info!("Stream closed after {} quotes", received);
    Ok(())
}

fn expect_frame(connection: &mut FeedConnection) -> Result<Frame> {
    connection
        .next_frame()?
        .ok_or_else(|| FeedError::Format("server closed the connection".into()))
}

fn unexpected(frame: Frame) -> FeedError {
    match frame {
        Frame::Error { kind, message } => {
            error!("Server error ({:?}): {}", kind, message);
            FeedError::Format(message)
        }
        other => FeedError::Format(format!("unexpected frame {:?}", other)),
    }
}

fn print_quote(quote: &Quote) {
    let time = i64::try_from(quote.timestamp)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map(|t| t.format("%H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| quote.timestamp.to_string());
    info!(
        "QUOTE: {} ({}) Price={:.2} Change={:+.2} ({:+.2}%) Volume={} Cap={} Time={}",
        quote.symbol,
        quote.company_name,
        quote.price,
        quote.change,
        quote.change_percent,
        quote.volume,
        quote.market_cap,
        time
    );
}

/// Symbols from the command line followed by those from `--path`.
fn selected_symbols(selection: Selection) -> Result<Vec<String>> {
    let mut symbols = selection.symbols;
    if let Some(path) = selection.path {
        let file_path = normalize_path(&path);
        if !is_file_exist(&file_path) {
            return Err(FeedError::ParseTickersFile(format!(
                "{} is not a file",
                file_path.display()
            )));
        }
        let tickers = Ticker::parse_from_file(BufReader::new(File::open(file_path)?))?;
        info!("Tickers: {:?}", tickers);
        symbols.extend(tickers.iter().map(ToString::to_string));
    }
    Ok(symbols)
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

/// Normalize a CLI-provided path string by trimming whitespace and matching quotes.
///
/// This allows passing Windows paths in quotes without breaking parsing.
fn normalize_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let no_quotes = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    PathBuf::from(no_quotes)
}

/// Returns `true` if the provided path exists and is a regular file.
fn is_file_exist(path: &PathBuf) -> bool {
    path.exists() && path.is_file()
}
