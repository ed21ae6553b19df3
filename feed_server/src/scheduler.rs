//! Broadcast scheduler.
//!
//! The `BroadcastScheduler` runs a background thread that, on every tick,
//! synthesizes one `Quote` per catalog instrument and pushes it to every sink
//! registered for that instrument. It is started once at startup and stopped
//! through the returned `SchedulerHandle`.
//!
//! Per tick and per instrument:
//! 1. compute the quote with the `PriceModel` and record it in the `QuoteBook`;
//! 2. take a snapshot of the instrument's sinks (no lock is held afterwards);
//! 3. push to every sink in the snapshot, collecting the ids of failed sinks;
//! 4. prune the failed sinks from the registry.
//!
//! A sink that fails on one instrument is dead for the whole tick: later
//! instruments skip it, and once every instrument is done it is pruned from
//! every symbol it was still registered under.
//!
//! A failing sink never stops delivery to the others, and an error while
//! handling one instrument is logged and does not affect the rest of the tick.
//! Every push is bounded by `push_timeout` and by what is left of the tick
//! budget, so slow subscribers cannot make the scheduler fall behind
//! indefinitely.

use crate::model::catalog::{Catalog, Instrument};
use crate::model::price_model::PriceModel;
use crate::model::quote_book::QuoteBook;
use crate::model::registry::SubscriptionRegistry;
use crate::model::sink::SinkId;
use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender, bounded, select, tick};
use feed_common::Result;
use feed_common::net::{PUSH_TIMEOUT_MS, TICK_INTERVAL_MS};
use log::{debug, error, info, warn};
use rand::Rng;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Timing parameters of the broadcast loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Time between two ticks.
    pub interval: Duration,
    /// Upper bound for one push to one sink.
    pub push_timeout: Duration,
    /// Upper bound for all pushes of one tick.
    pub tick_budget: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(TICK_INTERVAL_MS),
            push_timeout: Duration::from_millis(PUSH_TIMEOUT_MS),
            tick_budget: Duration::from_millis(TICK_INTERVAL_MS),
        }
    }
}

/// Outcome of one tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Instruments processed.
    pub instruments: usize,
    /// Successful pushes.
    pub delivered: usize,
    /// Sinks removed after a failed push.
    pub pruned: usize,
    /// Instruments whose fan-out hit a registry error.
    pub failed_instruments: usize,
}

struct FanOut {
    delivered: usize,
    pruned: usize,
}

/// Periodic quote broadcaster.
pub struct BroadcastScheduler {
    catalog: Arc<Catalog>,
    registry: Arc<SubscriptionRegistry>,
    book: Arc<QuoteBook>,
    config: SchedulerConfig,
}

impl BroadcastScheduler {
    /// Create a scheduler over shared catalog, registry and quote book.
    pub fn new(
        catalog: Arc<Catalog>,
        registry: Arc<SubscriptionRegistry>,
        book: Arc<QuoteBook>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            catalog,
            registry,
            book,
            config,
        }
    }

    /// Run one tick synchronously.
    pub fn tick(&self) -> TickReport {
        let started = Instant::now();
        let deadline = started + self.config.tick_budget;
        let now = Utc::now();
        let mut rng = rand::rng();
        let mut report = TickReport::default();
        let mut dead = Vec::new();

        for instrument in self.catalog.iter() {
            report.instruments += 1;
            match self.fan_out(instrument, now, deadline, &mut rng, &mut dead) {
                Ok(fan_out) => {
                    report.delivered += fan_out.delivered;
                    report.pruned += fan_out.pruned;
                }
                Err(e) => {
                    report.failed_instruments += 1;
                    error!("Broadcast of {} failed: {}", instrument.ticker, e);
                }
            }
        }

        match self.registry.prune_everywhere(&dead) {
            Ok(0) => {}
            Ok(removed) => {
                report.pruned += removed;
                info!(
                    "Removed {} dead subscriber(s) from their remaining symbols",
                    dead.len()
                );
            }
            Err(e) => error!("Pruning dead subscribers failed: {}", e),
        }

        let elapsed = started.elapsed();
        if elapsed > self.config.interval {
            warn!(
                "Tick took {:?}, longer than the {:?} interval",
                elapsed, self.config.interval
            );
        }
        debug!("Tick done in {:?}: {:?}", elapsed, report);
        report
    }

    fn fan_out<R: Rng + ?Sized>(
        &self,
        instrument: &Instrument,
        now: DateTime<Utc>,
        deadline: Instant,
        rng: &mut R,
        dead_in_tick: &mut Vec<SinkId>,
    ) -> Result<FanOut> {
        let ticker = instrument.ticker;
        let quote = PriceModel::quote_with(instrument, now, rng);
        if let Err(e) = self.book.record(ticker, quote.clone()) {
            warn!("Could not record {} in the quote book: {}", ticker, e);
        }

        let sinks = self.registry.snapshot(ticker)?;
        let mut dead = Vec::new();
        let mut delivered = 0;

        for sink in &sinks {
            if dead_in_tick.contains(&sink.id()) {
                dead.push(sink.id());
                continue;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            let timeout = self.config.push_timeout.min(remaining);
            match sink.push(&quote, timeout) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!("Delivery of {} to {} failed: {}", ticker, sink.id(), e);
                    dead.push(sink.id());
                    dead_in_tick.push(sink.id());
                }
            }
        }

        let pruned = self.registry.prune(ticker, &dead)?;
        if pruned > 0 {
            info!(
                "{}: removed {} dead subscriber(s), {} remaining",
                ticker,
                pruned,
                sinks.len() - dead.len()
            );
        }

        Ok(FanOut { delivered, pruned })
    }

    /// Start the broadcast thread. The first tick fires immediately.
    pub fn start(self) -> Result<SchedulerHandle> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let thread = thread::Builder::new()
            .name("broadcast-scheduler".into())
            .spawn(move || self.run(stop_rx))?;

        Ok(SchedulerHandle {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }

    fn run(&self, stop_rx: Receiver<()>) {
        info!(
            "Broadcast scheduler started: {} instruments every {:?} (Thread ID: {:?})",
            self.catalog.len(),
            self.config.interval,
            thread::current().id()
        );
        let ticker = tick(self.config.interval);
        self.tick();

        loop {
            select! {
                recv(stop_rx) -> _ => break,
                recv(ticker) -> _ => {
                    self.tick();
                }
            }
        }
        info!("Broadcast scheduler stopped");
    }
}

/// Owner of the running scheduler thread. Dropping it stops the scheduler.
pub struct SchedulerHandle {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stop the loop and wait for the current tick to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        drop(self.stop_tx.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Broadcast scheduler thread panicked");
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::registry::SharedSink;
    use crate::model::sink::{ChannelSink, DeliveryError, QuoteSink, SinkId};
    use feed_common::{Quote, Ticker};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingSink {
        id: SinkId,
        attempts: AtomicUsize,
    }

    impl FailingSink {
        fn new() -> Self {
            Self {
                id: SinkId::next(),
                attempts: AtomicUsize::new(0),
            }
        }
    }

    impl QuoteSink for FailingSink {
        fn id(&self) -> SinkId {
            self.id
        }

        fn push(&self, _quote: &Quote, _timeout: Duration) -> std::result::Result<(), DeliveryError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(DeliveryError::Disconnected)
        }
    }

    struct SlowSink {
        id: SinkId,
    }

    impl QuoteSink for SlowSink {
        fn id(&self) -> SinkId {
            self.id
        }

        fn push(&self, _quote: &Quote, timeout: Duration) -> std::result::Result<(), DeliveryError> {
            thread::sleep(timeout);
            Err(DeliveryError::Timeout)
        }
    }

    fn scheduler(config: SchedulerConfig) -> (BroadcastScheduler, Arc<SubscriptionRegistry>, Arc<QuoteBook>) {
        let catalog = Arc::new(Catalog::default());
        let registry = Arc::new(SubscriptionRegistry::new(&catalog));
        let book = Arc::new(QuoteBook::new());
        let scheduler = BroadcastScheduler::new(
            catalog,
            Arc::clone(&registry),
            Arc::clone(&book),
            config,
        );
        (scheduler, registry, book)
    }

    #[test]
    fn one_tick_delivers_one_quote_per_symbol() {
        let (scheduler, registry, _) = scheduler(SchedulerConfig::default());
        let (sink, rx) = ChannelSink::new(8);
        let sink: SharedSink = Arc::new(sink);
        registry.add_sink(Ticker::AAPL, &sink).unwrap();

        let report = scheduler.tick();
        assert_eq!(report.instruments, 5);
        assert_eq!(report.delivered, 1);

        let quote = rx.try_recv().unwrap();
        assert_eq!(quote.symbol, "AAPL");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn failing_sink_does_not_starve_the_others_and_is_pruned() {
        let (scheduler, registry, _) = scheduler(SchedulerConfig::default());
        let (a, rx_a) = ChannelSink::new(8);
        let (b, rx_b) = ChannelSink::new(8);
        let failing = Arc::new(FailingSink::new());
        let a: SharedSink = Arc::new(a);
        let b: SharedSink = Arc::new(b);
        let failing_dyn: SharedSink = failing.clone();

        registry.add_sink(Ticker::MSFT, &a).unwrap();
        registry.add_sink(Ticker::MSFT, &failing_dyn).unwrap();
        registry.add_sink(Ticker::MSFT, &b).unwrap();

        let report = scheduler.tick();
        assert_eq!(report.delivered, 2);
        assert_eq!(report.pruned, 1);
        assert_eq!(rx_a.try_recv().unwrap().symbol, "MSFT");
        assert_eq!(rx_b.try_recv().unwrap().symbol, "MSFT");
        assert!(!registry.contains(Ticker::MSFT, failing.id()).unwrap());

        scheduler.tick();
        assert_eq!(failing.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(rx_a.len(), 1);
        assert_eq!(rx_b.len(), 1);
    }

    #[test]
    fn sink_failing_on_one_symbol_is_dropped_from_all_of_them() {
        let (scheduler, registry, _) = scheduler(SchedulerConfig::default());
        let failing = Arc::new(FailingSink::new());
        let failing_dyn: SharedSink = failing.clone();
        for ticker in [Ticker::AAPL, Ticker::MSFT, Ticker::TSLA] {
            registry.add_sink(ticker, &failing_dyn).unwrap();
        }

        let report = scheduler.tick();
        assert_eq!(report.pruned, 3);
        assert_eq!(failing.attempts.load(Ordering::SeqCst), 1);
        for ticker in [Ticker::AAPL, Ticker::MSFT, Ticker::TSLA] {
            assert!(!registry.contains(ticker, failing.id()).unwrap());
        }
    }

    #[test]
    fn tick_records_quotes_in_the_book() {
        let (scheduler, _, book) = scheduler(SchedulerConfig::default());
        scheduler.tick();
        for ticker in [Ticker::AAPL, Ticker::GOOGL, Ticker::MSFT, Ticker::AMZN, Ticker::TSLA] {
            let quote = book.latest(ticker).unwrap().unwrap();
            assert_eq!(quote.symbol, ticker.to_string());
        }
    }

    #[test]
    fn tick_budget_bounds_slow_subscribers() {
        let config = SchedulerConfig {
            interval: Duration::from_millis(500),
            push_timeout: Duration::from_millis(100),
            tick_budget: Duration::from_millis(100),
        };
        let (scheduler, registry, _) = scheduler(config);
        let slow: Vec<SharedSink> = (0..5)
            .map(|_| Arc::new(SlowSink { id: SinkId::next() }) as SharedSink)
            .collect();
        for sink in &slow {
            registry.add_sink(Ticker::TSLA, sink).unwrap();
        }

        let started = Instant::now();
        let report = scheduler.tick();
        assert!(started.elapsed() < Duration::from_millis(300));
        assert_eq!(report.pruned, 5);
        assert_eq!(registry.subscriber_count(Ticker::TSLA).unwrap(), 0);
    }

    #[test]
    fn started_scheduler_ticks_until_stopped() {
        let config = SchedulerConfig {
            interval: Duration::from_millis(20),
            ..SchedulerConfig::default()
        };
        let (scheduler, registry, _) = scheduler(config);
        let (sink, rx) = ChannelSink::new(64);
        let sink: SharedSink = Arc::new(sink);
        registry.add_sink(Ticker::GOOGL, &sink).unwrap();

        let handle = scheduler.start().unwrap();
        let mut timestamps = Vec::new();
        for _ in 0..3 {
            let quote = rx.recv_timeout(Duration::from_secs(2)).unwrap();
            timestamps.push(quote.timestamp);
        }
        handle.stop();

        assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
        while rx.try_recv().is_ok() {}
        thread::sleep(Duration::from_millis(60));
        assert!(rx.try_recv().is_err());
    }
}
