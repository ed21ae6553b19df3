//! Wire protocol shared by client and server.
//!
//! Every TCP connection carries newline-delimited JSON. The client writes one
//! `Command` per line; the server answers with one or more `Frame`s, one per
//! line. Streaming commands keep the connection open and the server keeps
//! writing `Frame::Update` until the client disconnects or sends
//! `Command::Unsubscribe`.
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, FeedError};
use crate::quote::Quote;

/// Request sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Current quote of one symbol.
    Get {
        /// Case-insensitive symbol.
        symbol: String,
    },
    /// All symbols of the catalog.
    List,
    /// Stream broadcast ticks for one symbol.
    Subscribe {
        /// Case-insensitive symbol.
        symbol: String,
    },
    /// Stream broadcast ticks for several symbols at once.
    SubscribeMany {
        /// Case-insensitive symbols.
        symbols: Vec<String>,
    },
    /// End the stream opened on this connection.
    Unsubscribe,
    /// Per-connection snapshot loop that does not share the broadcast.
    Poll {
        /// Case-insensitive symbols; empty means every catalog symbol.
        #[serde(default)]
        symbols: Vec<String>,
    },
}

/// Message sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Answer to `Command::Get`.
    Quote {
        /// Freshest known quote.
        quote: Quote,
    },
    /// Answer to `Command::List`.
    Symbols {
        /// Catalog symbols in catalog order.
        symbols: Vec<String>,
    },
    /// The stream is registered for these symbols.
    Subscribed {
        /// Normalized symbols.
        symbols: Vec<String>,
    },
    /// One quote on a stream or poll connection.
    Update {
        /// The quote.
        quote: Quote,
    },
    /// The request failed.
    Error {
        /// Error category.
        kind: ErrorKind,
        /// Human-readable description.
        message: String,
    },
}

impl Command {
    /// Encode the command as one JSON line.
    pub fn to_line(&self) -> Result<Vec<u8>, FeedError> {
        to_line(self)
    }
}

impl Frame {
    /// Encode the frame as one JSON line.
    pub fn to_line(&self) -> Result<Vec<u8>, FeedError> {
        to_line(self)
    }

    /// Error frame describing `err`.
    pub fn error(err: &FeedError) -> Self {
        Frame::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

fn to_line<T: Serialize>(value: &T) -> Result<Vec<u8>, FeedError> {
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    Ok(line)
}
