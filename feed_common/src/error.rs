//! Error types shared between client and server.
//!
//! The `FeedError` enum unifies common failure cases for I/O, serialization,
//! lock poisoning and catalog lookups, allowing crates to propagate a single
//! error type. Catalog failures additionally map onto an `ErrorKind` that is
//! sent to clients inside an error frame.
use std::io;
use std::sync::PoisonError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type shared by client and server.
#[derive(Error, Debug)]
pub enum FeedError {
    /// I/O error originating from the standard library or sockets/files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Generic formatting/validation error with a human-readable message.
    #[error("Format error: {0}")]
    Format(String),

    /// Error while parsing a tickers file into `Ticker` values.
    #[error("Parse tickers file error: {0}")]
    ParseTickersFile(String),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// A poisoned mutex/lock was encountered.
    #[error("Mutex Lock Poisoned: {0}")]
    MutexLock(String),

    /// A single requested symbol is not part of the catalog.
    #[error("Ticker not found: {0}")]
    NotFound(String),

    /// One or more symbols of a multi-symbol request are not part of the catalog.
    #[error("Invalid symbols: {}", .0.join(", "))]
    InvalidArgument(Vec<String>),
}

impl FeedError {
    /// Category reported to clients.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FeedError::NotFound(_) => ErrorKind::NotFound,
            FeedError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            FeedError::Format(_) | FeedError::SerdeJson(_) => ErrorKind::BadRequest,
            _ => ErrorKind::Internal,
        }
    }
}

impl<T> From<PoisonError<T>> for FeedError {
    fn from(err: PoisonError<T>) -> Self {
        FeedError::MutexLock(err.to_string())
    }
}

/// Error category carried by `Frame::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unknown symbol on a single-symbol operation.
    NotFound,
    /// Unknown symbols on a multi-symbol operation.
    InvalidArgument,
    /// The request line could not be understood.
    BadRequest,
    /// Anything the client cannot fix by changing the request.
    Internal,
}
