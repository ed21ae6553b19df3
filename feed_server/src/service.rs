//! Client-facing operations of the feed server.
//!
//! A connection speaks newline-delimited JSON (`Command` in, `Frame` out).
//! `get` and `list` are answered inline and the connection stays open for
//! more commands. `subscribe`, `subscribe_many` and `poll` turn the connection
//! into a stream for the rest of its life:
//!
//! - streaming subscriptions register a `TcpSink` through a
//!   `SubscriberSession` and receive the shared broadcast;
//! - `poll` runs an independent `Poller` loop on the connection's own thread.
//!
//! In both cases a watcher thread reads the remaining input. End of input, a
//! read error or an `unsubscribe` command cancels the stream.

use crate::config::ServerConfig;
use crate::model::catalog::Catalog;
use crate::model::price_model::PriceModel;
use crate::model::quote_book::QuoteBook;
use crate::model::registry::{SharedSink, SubscriptionRegistry};
use crate::model::sink::TcpSink;
use crate::poller::Poller;
use crate::session::{SubscriberSession, SubscriptionRequest};
use chrono::Utc;
use crossbeam_channel::{Receiver, Sender, bounded};
use feed_common::{Command, Frame, Quote, Result};
use log::{debug, error, info, warn};
use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Shared state behind every client connection.
pub struct FeedService {
    catalog: Arc<Catalog>,
    registry: Arc<SubscriptionRegistry>,
    book: Arc<QuoteBook>,
    poller: Poller,
    write_timeout: Duration,
    quote_max_age: Duration,
    shutdown: Receiver<()>,
}

impl FeedService {
    /// Build the service. Streams end when every sender of `shutdown` is dropped.
    pub fn new(
        catalog: Arc<Catalog>,
        registry: Arc<SubscriptionRegistry>,
        book: Arc<QuoteBook>,
        config: &ServerConfig,
        shutdown: Receiver<()>,
    ) -> Self {
        Self {
            poller: Poller::new(Arc::clone(&catalog), config.poll_interval),
            catalog,
            registry,
            book,
            write_timeout: config.write_timeout,
            quote_max_age: config.quote_max_age,
            shutdown,
        }
    }

    /// Current quote for `symbol`.
    ///
    /// Returns the quote of the latest broadcast tick while it is recent, so a
    /// lookup matches what subscribers just received. Otherwise a fresh quote
    /// is computed.
    pub fn get_quote(&self, symbol: &str) -> Result<Quote> {
        let instrument = self.catalog.resolve(symbol)?;
        let now = Utc::now();
        let now_ms = u64::try_from(now.timestamp_millis()).unwrap_or_default();
        let max_age_ms = u64::try_from(self.quote_max_age.as_millis()).unwrap_or(u64::MAX);

        if let Some(quote) = self.book.fresh(instrument.ticker, now_ms, max_age_ms)? {
            return Ok(quote);
        }
        Ok(PriceModel::quote(instrument, now))
    }

    /// Every supported symbol, in catalog order.
    pub fn list_symbols(&self) -> Vec<String> {
        self.catalog.symbols()
    }

    /// Serve one client connection until it closes.
    pub fn handle_connection(&self, stream: TcpStream) -> Result<()> {
        let peer = stream.peer_addr()?;
        stream.set_write_timeout(Some(self.write_timeout))?;
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut line = String::new();

        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                debug!("{} closed the connection", peer);
                return Ok(());
            }
            let request = line.trim();
            if request.is_empty() {
                continue;
            }

            let command: Command = match serde_json::from_str(request) {
                Ok(command) => command,
                Err(e) => {
                    warn!("Malformed request from {}: {}", peer, e);
                    write_frame(&stream, &Frame::error(&e.into()))?;
                    continue;
                }
            };
            info!("Received command {:?} from {}", command, peer);

            match command {
                Command::Get { symbol } => {
                    let frame = match self.get_quote(&symbol) {
                        Ok(quote) => Frame::Quote { quote },
                        Err(e) => {
                            warn!("get {} from {} failed: {}", symbol, peer, e);
                            Frame::error(&e)
                        }
                    };
                    write_frame(&stream, &frame)?;
                }
                Command::List => {
                    let symbols = self.list_symbols();
                    write_frame(&stream, &Frame::Symbols { symbols })?;
                }
                Command::Subscribe { symbol } => {
                    return self.serve_stream(stream, reader, SubscriptionRequest::Single(symbol));
                }
                Command::SubscribeMany { symbols } => {
                    return self.serve_stream(stream, reader, SubscriptionRequest::Many(symbols));
                }
                Command::Poll { symbols } => {
                    return self.serve_poll(stream, reader, &symbols);
                }
                Command::Unsubscribe => debug!("{} sent unsubscribe without a stream", peer),
            }
        }
    }

    fn serve_stream(
        &self,
        stream: TcpStream,
        reader: BufReader<TcpStream>,
        request: SubscriptionRequest,
    ) -> Result<()> {
        let peer = stream.peer_addr()?;
        let tickers = match request.resolve(&self.catalog) {
            Ok(tickers) => tickers,
            Err(e) => {
                warn!("Subscription from {} rejected: {}", peer, e);
                return write_frame(&stream, &Frame::error(&e));
            }
        };

        let sink = Arc::new(TcpSink::new(stream.try_clone()?)?);
        let ack = Frame::Subscribed {
            symbols: tickers.iter().map(ToString::to_string).collect(),
        };
        if let Err(e) = sink.send_frame(&ack, self.write_timeout) {
            info!("{} left before its stream started: {}", peer, e);
            return Ok(());
        }

        let shared: SharedSink = sink.clone();
        let mut session = SubscriberSession::new(Arc::clone(&self.registry), shared);
        if let Err(e) = session.activate(&tickers) {
            error!("Could not start the stream for {}: {}", peer, e);
            let _ = sink.send_frame(&Frame::error(&e), self.write_timeout);
            return Err(e);
        }

        let (cancel_tx, cancel_rx) = bounded::<()>(1);
        let watcher = spawn_watcher(reader, cancel_tx)?;
        let end = session.wait(&cancel_rx, &self.shutdown);
        session.close();

        finish(&stream, watcher);
        info!("Stream for {} ended: {:?}", peer, end);
        Ok(())
    }

    fn serve_poll(
        &self,
        stream: TcpStream,
        reader: BufReader<TcpStream>,
        symbols: &[String],
    ) -> Result<()> {
        let peer = stream.peer_addr()?;
        let (cancel_tx, cancel_rx) = bounded::<()>(1);
        let watcher = spawn_watcher(reader, cancel_tx)?;

        let mut out = stream.try_clone()?;
        let written = self.poller.run(symbols, &mut out, &cancel_rx, &self.shutdown);

        finish(&stream, watcher);
        let written = written?;
        info!("Poll stream for {} ended after {} frames", peer, written);
        Ok(())
    }
}

fn write_frame(mut out: &TcpStream, frame: &Frame) -> Result<()> {
    out.write_all(&frame.to_line()?)?;
    Ok(())
}

fn spawn_watcher(reader: BufReader<TcpStream>, cancel_tx: Sender<()>) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("stream-watcher".into())
        .spawn(move || watch_input(reader, cancel_tx))?;
    Ok(handle)
}

/// Read until the client is gone or unsubscribes, then drop `cancel_tx`.
fn watch_input(reader: BufReader<TcpStream>, cancel_tx: Sender<()>) {
    for line in reader.lines() {
        let Ok(line) = line else { break };
        match serde_json::from_str::<Command>(line.trim()) {
            Ok(Command::Unsubscribe) => break,
            Ok(other) => debug!("Ignoring {:?} on an open stream", other),
            Err(e) => debug!("Ignoring malformed line on an open stream: {}", e),
        }
    }
    drop(cancel_tx);
}

fn finish(stream: &TcpStream, watcher: JoinHandle<()>) {
    // Unblocks the watcher if the stream ended on shutdown.
    let _ = stream.shutdown(Shutdown::Both);
    if watcher.join().is_err() {
        error!("Stream watcher panicked");
    }
}
