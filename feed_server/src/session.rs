//! Subscriber sessions.
//!
//! A session is the server-side lifetime of one streaming subscription:
//!
//! ```text
//! Pending ──activate──▶ Active ──cancel / shutdown──▶ Closing ──close──▶ Closed
//! ```
//!
//! - **Pending**: the request has been validated against the catalog (see
//!   [`SubscriptionRequest::resolve`]) but nothing is registered yet.
//! - **Active**: the session's sink is registered under every requested symbol.
//!   If registering any symbol fails, the symbols registered so far are removed
//!   again and the session ends up `Closed`.
//! - **Closing**: the connection was cancelled or the server is shutting down.
//! - **Closed**: the sink has been removed from every symbol.
//!
//! While active, the session does no work of its own: quotes are pushed to its
//! sink by the broadcast scheduler and the owning thread just blocks in
//! [`SubscriberSession::wait`]. Dropping a session closes it.

use crate::model::catalog::Catalog;
use crate::model::registry::{SharedSink, SubscriptionRegistry};
use crate::model::sink::SinkId;
use crossbeam_channel::{Receiver, select};
use feed_common::{FeedError, Result, Ticker};
use log::{debug, error, info};
use std::sync::Arc;

/// What the client asked to stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionRequest {
    /// One symbol; an unknown symbol is `NotFound`.
    Single(String),
    /// Several symbols; any unknown symbol makes the whole request `InvalidArgument`.
    /// An empty list means every catalog symbol.
    Many(Vec<String>),
}

impl SubscriptionRequest {
    /// Validate the request against `catalog`.
    pub fn resolve(&self, catalog: &Catalog) -> Result<Vec<Ticker>> {
        match self {
            SubscriptionRequest::Single(symbol) => Ok(vec![catalog.resolve(symbol)?.ticker]),
            SubscriptionRequest::Many(symbols) if symbols.is_empty() => Ok(catalog.tickers()),
            SubscriptionRequest::Many(symbols) => catalog.resolve_all(symbols),
        }
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing registered yet.
    Pending,
    /// Registered under every requested symbol.
    Active,
    /// Cancellation observed, registrations still present.
    Closing,
    /// Every registration removed.
    Closed,
}

/// Why an active session stopped waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client disconnected or unsubscribed.
    Cancelled,
    /// The server is shutting down.
    Shutdown,
}

/// One streaming subscription.
pub struct SubscriberSession {
    registry: Arc<SubscriptionRegistry>,
    sink: SharedSink,
    registered: Vec<Ticker>,
    state: SessionState,
}

impl SubscriberSession {
    /// New pending session owning `sink`.
    pub fn new(registry: Arc<SubscriptionRegistry>, sink: SharedSink) -> Self {
        Self {
            registry,
            sink,
            registered: Vec::new(),
            state: SessionState::Pending,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Identity of the owned sink.
    pub fn sink_id(&self) -> SinkId {
        self.sink.id()
    }

    /// Symbols the sink is currently registered under.
    pub fn symbols(&self) -> &[Ticker] {
        &self.registered
    }

    /// Register the sink under every ticker in `tickers`.
    ///
    /// All or nothing: on failure every registration made by this call is
    /// undone, the session is `Closed` and the error is returned.
    pub fn activate(&mut self, tickers: &[Ticker]) -> Result<()> {
        if self.state != SessionState::Pending {
            return Err(FeedError::Format(format!(
                "cannot activate a session in state {:?}",
                self.state
            )));
        }

        for &ticker in tickers {
            if let Err(e) = self.registry.add_sink(ticker, &self.sink) {
                error!(
                    "Registering {} under {} failed, rolling back: {}",
                    self.sink.id(),
                    ticker,
                    e
                );
                self.unregister_all();
                self.state = SessionState::Closed;
                return Err(e);
            }
            if !self.registered.contains(&ticker) {
                self.registered.push(ticker);
            }
        }

        self.state = SessionState::Active;
        info!(
            "{} active for {}",
            self.sink.id(),
            join_tickers(&self.registered)
        );
        Ok(())
    }

    /// Block until `cancel` or `shutdown` fires (a message or a disconnect).
    ///
    /// Returns immediately with `Cancelled` if the session is not active.
    pub fn wait(&mut self, cancel: &Receiver<()>, shutdown: &Receiver<()>) -> SessionEnd {
        if self.state != SessionState::Active {
            return SessionEnd::Cancelled;
        }
        let end = select! {
            recv(cancel) -> _ => SessionEnd::Cancelled,
            recv(shutdown) -> _ => SessionEnd::Shutdown,
        };
        self.state = SessionState::Closing;
        debug!("{} closing: {:?}", self.sink.id(), end);
        end
    }

    /// Remove the sink from every symbol. Idempotent.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closing;
        let symbols = join_tickers(&self.registered);
        self.unregister_all();
        self.state = SessionState::Closed;
        if !symbols.is_empty() {
            info!("{} closed, unsubscribed from {}", self.sink.id(), symbols);
        }
    }

    fn unregister_all(&mut self) {
        let id = self.sink.id();
        let tickers = std::mem::take(&mut self.registered);
        if let Err(e) = self.registry.remove_all(id, &tickers) {
            error!("Removing {} from {} failed: {}", id, join_tickers(&tickers), e);
        }
    }
}

impl Drop for SubscriberSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn join_tickers(tickers: &[Ticker]) -> String {
    tickers
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::catalog::Instrument;
    use crate::model::sink::ChannelSink;
    use crossbeam_channel::bounded;
    use std::thread;
    use std::time::Duration;

    fn setup() -> (Arc<Catalog>, Arc<SubscriptionRegistry>, SharedSink) {
        let catalog = Arc::new(Catalog::default());
        let registry = Arc::new(SubscriptionRegistry::new(&catalog));
        let (sink, _rx) = ChannelSink::new(1);
        (catalog, registry, Arc::new(sink))
    }

    #[test]
    fn single_unknown_symbol_is_not_found() {
        let catalog = Catalog::default();
        let request = SubscriptionRequest::Single("zzzz".into());
        assert!(matches!(request.resolve(&catalog), Err(FeedError::NotFound(s)) if s == "ZZZZ"));
    }

    #[test]
    fn many_with_unknown_symbol_is_invalid_argument() {
        let catalog = Catalog::default();
        let request = SubscriptionRequest::Many(vec!["AAPL".into(), "ZZZZ".into()]);
        match request.resolve(&catalog) {
            Err(FeedError::InvalidArgument(unknown)) => assert_eq!(unknown, vec!["ZZZZ"]),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn empty_many_request_means_every_symbol() {
        let catalog = Catalog::default();
        let tickers = SubscriptionRequest::Many(Vec::new())
            .resolve(&catalog)
            .unwrap();
        assert_eq!(tickers, catalog.tickers());
    }

    #[test]
    fn activate_registers_every_symbol_and_close_removes_them() {
        let (catalog, registry, sink) = setup();
        let id = sink.id();
        let tickers = SubscriptionRequest::Many(vec!["aapl".into(), "TSLA".into()])
            .resolve(&catalog)
            .unwrap();

        let mut session = SubscriberSession::new(Arc::clone(&registry), sink);
        assert_eq!(session.state(), SessionState::Pending);
        session.activate(&tickers).unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert!(registry.contains(Ticker::AAPL, id).unwrap());
        assert!(registry.contains(Ticker::TSLA, id).unwrap());

        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!registry.contains(Ticker::AAPL, id).unwrap());
        assert!(!registry.contains(Ticker::TSLA, id).unwrap());
    }

    #[test]
    fn failed_registration_unwinds_earlier_symbols() {
        let subset = Catalog::new(vec![Instrument::new(Ticker::AAPL, "Apple Inc.", 1.0, 1.0)]);
        let registry = Arc::new(SubscriptionRegistry::new(&subset));
        let (sink, _rx) = ChannelSink::new(1);
        let sink: SharedSink = Arc::new(sink);
        let id = sink.id();

        let mut session = SubscriberSession::new(Arc::clone(&registry), sink);
        let err = session.activate(&[Ticker::AAPL, Ticker::TSLA]).unwrap_err();
        assert!(matches!(err, FeedError::NotFound(_)));
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.symbols().is_empty());
        assert!(!registry.contains(Ticker::AAPL, id).unwrap());
    }

    #[test]
    fn activate_twice_is_rejected() {
        let (_, registry, sink) = setup();
        let mut session = SubscriberSession::new(registry, sink);
        session.activate(&[Ticker::MSFT]).unwrap();
        assert!(session.activate(&[Ticker::AAPL]).is_err());
        assert_eq!(session.symbols(), &[Ticker::MSFT]);
    }

    #[test]
    fn wait_returns_on_cancel() {
        let (_, registry, sink) = setup();
        let mut session = SubscriberSession::new(registry, sink);
        session.activate(&[Ticker::GOOGL]).unwrap();

        let (cancel_tx, cancel_rx) = bounded::<()>(1);
        let (_shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            drop(cancel_tx);
        });

        assert_eq!(session.wait(&cancel_rx, &shutdown_rx), SessionEnd::Cancelled);
        assert_eq!(session.state(), SessionState::Closing);
        canceller.join().unwrap();
    }

    #[test]
    fn wait_returns_on_shutdown() {
        let (_, registry, sink) = setup();
        let mut session = SubscriberSession::new(registry, sink);
        session.activate(&[Ticker::AMZN]).unwrap();

        let (_cancel_tx, cancel_rx) = bounded::<()>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        shutdown_tx.send(()).unwrap();

        assert_eq!(session.wait(&cancel_rx, &shutdown_rx), SessionEnd::Shutdown);
    }

    #[test]
    fn drop_unregisters() {
        let (_, registry, sink) = setup();
        let id = sink.id();
        {
            let mut session = SubscriberSession::new(Arc::clone(&registry), sink);
            session.activate(&[Ticker::AAPL]).unwrap();
        }
        assert!(!registry.contains(Ticker::AAPL, id).unwrap());
    }
}
