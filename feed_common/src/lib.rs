//!
//! Common types and utilities shared by the feed server and client.
//!
//! This crate aggregates:
//! - `error` — unified error type `FeedError` used across the workspace.
//! - `result` — handy `Result<T, FeedError>` alias.
//! - `tickers` — catalog ticker symbols and parsing helpers shared by both sides.
//! - `quote` — the `Quote` payload produced by the server's price model.
//! - `command` — line-delimited JSON commands and frames exchanged over TCP.
//! - `net` — networking constants, default cadences and small helpers.
#![warn(missing_docs)]
pub mod command;
pub mod error;
pub mod net;
pub mod quote;
pub mod result;
pub mod tickers;

pub use command::{Command, Frame};
pub use error::{ErrorKind, FeedError};
pub use quote::Quote;
pub use result::Result;
pub use tickers::Ticker;
