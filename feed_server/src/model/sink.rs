//! Subscriber sinks.
//!
//! A sink is the outbound side of one subscriber: something that accepts a
//! sequence of quotes and can fail. Sessions own their sink through an `Arc`;
//! the registry only keeps a `Weak` to it, so a sink lives exactly as long as
//! the session that created it.
//!
//! Two implementations are provided:
//! - `TcpSink` — writes `Frame::Update` lines to a client connection. A failed
//!   write shuts the socket down so the owning session observes the disconnect.
//! - `ChannelSink` — forwards quotes into a bounded `crossbeam_channel`, for
//!   in-process consumers.

use crossbeam_channel::{Receiver, SendTimeoutError, Sender, bounded};
use feed_common::{FeedError, Frame, Quote};
use log::debug;
use std::io::{self, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

/// `set_write_timeout` rejects a zero duration.
const MIN_WRITE_TIMEOUT: Duration = Duration::from_millis(1);

static NEXT_SINK_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique sink identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SinkId(u64);

impl SinkId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        SinkId(NEXT_SINK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for SinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sink#{}", self.0)
    }
}

/// Why a push did not reach the subscriber. Never surfaced to clients.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// The subscriber did not accept the quote within the allotted time.
    #[error("push timed out")]
    Timeout,
    /// The subscriber is gone.
    #[error("subscriber disconnected")]
    Disconnected,
    /// Transport failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The frame could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] FeedError),
}

/// Destination for one subscriber's quotes.
pub trait QuoteSink: Send + Sync {
    /// Identity used by the registry.
    fn id(&self) -> SinkId;

    /// Deliver `quote`, waiting at most `timeout`.
    fn push(&self, quote: &Quote, timeout: Duration) -> Result<(), DeliveryError>;
}

/// Sink writing newline-delimited JSON frames to a TCP client.
pub struct TcpSink {
    id: SinkId,
    peer: SocketAddr,
    stream: Mutex<TcpStream>,
    broken: AtomicBool,
}

impl TcpSink {
    /// Wrap the write half of a client connection.
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        let peer = stream.peer_addr()?;
        Ok(Self {
            id: SinkId::next(),
            peer,
            stream: Mutex::new(stream),
            broken: AtomicBool::new(false),
        })
    }

    /// Client address.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Write any frame, e.g. the subscription acknowledgement.
    pub fn send_frame(&self, frame: &Frame, timeout: Duration) -> Result<(), DeliveryError> {
        if self.broken.load(Ordering::Acquire) {
            return Err(DeliveryError::Disconnected);
        }
        let line = frame.to_line()?;
        let mut stream = self
            .stream
            .lock()
            .map_err(|_| DeliveryError::Disconnected)?;

        match write_line(&mut stream, &line, timeout) {
            Ok(()) => Ok(()),
            Err(e) => {
                // A timed out write may have left half a frame on the wire.
                self.broken.store(true, Ordering::Release);
                let _ = stream.shutdown(Shutdown::Both);
                debug!("{} to {} failed: {}", self.id, self.peer, e);
                match e.kind() {
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
                        Err(DeliveryError::Timeout)
                    }
                    _ => Err(DeliveryError::Io(e)),
                }
            }
        }
    }
}

fn write_line(stream: &mut TcpStream, line: &[u8], timeout: Duration) -> io::Result<()> {
    stream.set_write_timeout(Some(timeout.max(MIN_WRITE_TIMEOUT)))?;
    stream.write_all(line)?;
    stream.flush()
}

impl QuoteSink for TcpSink {
    fn id(&self) -> SinkId {
        self.id
    }

    fn push(&self, quote: &Quote, timeout: Duration) -> Result<(), DeliveryError> {
        self.send_frame(
            &Frame::Update {
                quote: quote.clone(),
            },
            timeout,
        )
    }
}

/// Sink forwarding quotes into a bounded channel.
///
/// Dropping the receiver makes every later push fail with
/// `DeliveryError::Disconnected`; a full channel makes it fail with
/// `DeliveryError::Timeout` once `timeout` elapses. After the first failure
/// the sink stays failed, like a broken `TcpSink`.
pub struct ChannelSink {
    id: SinkId,
    tx: Sender<Quote>,
    failed: AtomicBool,
}

impl ChannelSink {
    /// Sink plus the receiving end, buffering at most `capacity` quotes.
    pub fn new(capacity: usize) -> (Self, Receiver<Quote>) {
        let (tx, rx) = bounded(capacity);
        (
            Self {
                id: SinkId::next(),
                tx,
                failed: AtomicBool::new(false),
            },
            rx,
        )
    }
}

impl QuoteSink for ChannelSink {
    fn id(&self) -> SinkId {
        self.id
    }

    fn push(&self, quote: &Quote, timeout: Duration) -> Result<(), DeliveryError> {
        if self.failed.load(Ordering::Acquire) {
            return Err(DeliveryError::Disconnected);
        }
        let result = match self.tx.send_timeout(quote.clone(), timeout) {
            Ok(()) => return Ok(()),
            Err(SendTimeoutError::Timeout(_)) => DeliveryError::Timeout,
            Err(SendTimeoutError::Disconnected(_)) => DeliveryError::Disconnected,
        };
        self.failed.store(true, Ordering::Release);
        Err(result)
    }
}
