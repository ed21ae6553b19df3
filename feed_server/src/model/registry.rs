//! Subscription registry: which sinks want which symbol.
//!
//! The registry is built once from the catalog with one `Mutex`-guarded slot
//! per symbol. The outer map is never modified afterwards, so two symbols never
//! contend with each other, and every lock is held only for the duration of a
//! single add/remove/snapshot/prune. Delivery never happens under a lock:
//! the scheduler takes a [`SubscriptionRegistry::snapshot`] and pushes from the
//! copy.
//!
//! Entries are `Weak` references keyed by `SinkId`; a slot behaves like an
//! insertion-ordered set, and entries whose owner is gone are discarded the next
//! time the slot is snapshotted.

use crate::model::catalog::Catalog;
use crate::model::sink::{QuoteSink, SinkId};
use feed_common::{FeedError, Result, Ticker};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

/// Shared handle to a sink, as owned by a session.
pub type SharedSink = Arc<dyn QuoteSink>;

struct Entry {
    id: SinkId,
    sink: Weak<dyn QuoteSink>,
}

/// Concurrent symbol → sinks map.
pub struct SubscriptionRegistry {
    slots: HashMap<Ticker, Mutex<Vec<Entry>>>,
}

impl SubscriptionRegistry {
    /// Empty registry with a slot for every instrument of `catalog`.
    pub fn new(catalog: &Catalog) -> Self {
        let slots = catalog
            .tickers()
            .into_iter()
            .map(|ticker| (ticker, Mutex::new(Vec::new())))
            .collect();
        Self { slots }
    }

    fn slot(&self, ticker: Ticker) -> Result<&Mutex<Vec<Entry>>> {
        self.slots
            .get(&ticker)
            .ok_or_else(|| FeedError::NotFound(ticker.to_string()))
    }

    /// Register `sink` under `ticker`.
    ///
    /// Returns `false` if the sink was already registered there.
    pub fn add_sink(&self, ticker: Ticker, sink: &SharedSink) -> Result<bool> {
        let id = sink.id();
        let mut entries = self.slot(ticker)?.lock()?;
        if entries.iter().any(|e| e.id == id) {
            return Ok(false);
        }
        entries.push(Entry {
            id,
            sink: Arc::downgrade(sink),
        });
        Ok(true)
    }

    /// Unregister the sink `id` from `ticker`.
    ///
    /// Returns `false` if it was not registered there.
    pub fn remove_sink(&self, ticker: Ticker, id: SinkId) -> Result<bool> {
        let mut entries = self.slot(ticker)?.lock()?;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        Ok(entries.len() != before)
    }

    /// Unregister the sink `id` from every ticker in `tickers`.
    ///
    /// Every ticker is attempted even if one fails; the first error is then
    /// returned. Returns how many registrations were removed.
    pub fn remove_all(&self, id: SinkId, tickers: &[Ticker]) -> Result<usize> {
        let mut removed = 0;
        let mut first_err = None;
        for &ticker in tickers {
            match self.remove_sink(ticker, id) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }

    /// Unregister every sink in `dead` from `ticker` under one lock acquisition.
    ///
    /// Returns how many entries were removed.
    pub fn prune(&self, ticker: Ticker, dead: &[SinkId]) -> Result<usize> {
        if dead.is_empty() {
            return Ok(0);
        }
        let mut entries = self.slot(ticker)?.lock()?;
        let before = entries.len();
        entries.retain(|e| !dead.contains(&e.id));
        Ok(before - entries.len())
    }

    /// Unregister every sink in `dead` from every symbol.
    ///
    /// Every slot is visited even if one fails; the first error is then
    /// returned. Returns how many entries were removed.
    pub fn prune_everywhere(&self, dead: &[SinkId]) -> Result<usize> {
        if dead.is_empty() {
            return Ok(0);
        }
        let mut removed = 0;
        let mut first_err = None;
        for slot in self.slots.values() {
            match slot.lock() {
                Ok(mut entries) => {
                    let before = entries.len();
                    entries.retain(|e| !dead.contains(&e.id));
                    removed += before - entries.len();
                }
                Err(e) => {
                    first_err.get_or_insert(FeedError::from(e));
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }

    /// Point-in-time copy of the live sinks registered under `ticker`, in
    /// registration order.
    pub fn snapshot(&self, ticker: Ticker) -> Result<Vec<SharedSink>> {
        let mut entries = self.slot(ticker)?.lock()?;
        let mut live = Vec::with_capacity(entries.len());
        entries.retain(|e| match e.sink.upgrade() {
            Some(sink) => {
                live.push(sink);
                true
            }
            None => false,
        });
        Ok(live)
    }

    /// Whether the sink `id` is registered under `ticker`.
    pub fn contains(&self, ticker: Ticker, id: SinkId) -> Result<bool> {
        let entries = self.slot(ticker)?.lock()?;
        Ok(entries.iter().any(|e| e.id == id))
    }

    /// Number of live sinks registered under `ticker`.
    pub fn subscriber_count(&self, ticker: Ticker) -> Result<usize> {
        let entries = self.slot(ticker)?.lock()?;
        Ok(entries.iter().filter(|e| e.sink.strong_count() > 0).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::catalog::Instrument;
    use crate::model::sink::ChannelSink;

    fn sink() -> SharedSink {
        let (sink, _rx) = ChannelSink::new(1);
        Arc::new(sink)
    }

    #[test]
    fn add_is_idempotent_per_sink() {
        let registry = SubscriptionRegistry::new(&Catalog::default());
        let a = sink();
        assert!(registry.add_sink(Ticker::AAPL, &a).unwrap());
        assert!(!registry.add_sink(Ticker::AAPL, &a).unwrap());
        assert_eq!(registry.subscriber_count(Ticker::AAPL).unwrap(), 1);
        assert_eq!(registry.snapshot(Ticker::AAPL).unwrap().len(), 1);
    }

    #[test]
    fn remove_only_touches_that_symbol() {
        let registry = SubscriptionRegistry::new(&Catalog::default());
        let a = sink();
        registry.add_sink(Ticker::AAPL, &a).unwrap();
        registry.add_sink(Ticker::MSFT, &a).unwrap();

        assert!(registry.remove_sink(Ticker::AAPL, a.id()).unwrap());
        assert!(!registry.remove_sink(Ticker::AAPL, a.id()).unwrap());
        assert!(!registry.contains(Ticker::AAPL, a.id()).unwrap());
        assert!(registry.contains(Ticker::MSFT, a.id()).unwrap());
    }

    #[test]
    fn snapshot_is_a_copy_in_registration_order() {
        let registry = SubscriptionRegistry::new(&Catalog::default());
        let (a, b, c) = (sink(), sink(), sink());
        registry.add_sink(Ticker::TSLA, &a).unwrap();
        registry.add_sink(Ticker::TSLA, &b).unwrap();

        let snapshot = registry.snapshot(Ticker::TSLA).unwrap();
        registry.add_sink(Ticker::TSLA, &c).unwrap();
        registry.remove_sink(Ticker::TSLA, a.id()).unwrap();

        let ids: Vec<_> = snapshot.iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![a.id(), b.id()]);
    }

    #[test]
    fn dropped_sinks_disappear() {
        let registry = SubscriptionRegistry::new(&Catalog::default());
        let a = sink();
        let id = a.id();
        registry.add_sink(Ticker::GOOGL, &a).unwrap();
        drop(a);

        assert_eq!(registry.subscriber_count(Ticker::GOOGL).unwrap(), 0);
        assert!(registry.snapshot(Ticker::GOOGL).unwrap().is_empty());
        assert!(!registry.contains(Ticker::GOOGL, id).unwrap());
    }

    #[test]
    fn remove_all_keeps_going_past_unknown_symbols() {
        let subset = Catalog::new(vec![
            Instrument::new(Ticker::AAPL, "Apple Inc.", 1.0, 1.0),
            Instrument::new(Ticker::MSFT, "Microsoft Corporation", 1.0, 1.0),
        ]);
        let registry = SubscriptionRegistry::new(&subset);
        let a = sink();
        registry.add_sink(Ticker::AAPL, &a).unwrap();
        registry.add_sink(Ticker::MSFT, &a).unwrap();

        let err = registry
            .remove_all(a.id(), &[Ticker::AAPL, Ticker::TSLA, Ticker::MSFT])
            .unwrap_err();
        assert!(matches!(err, FeedError::NotFound(_)));
        assert!(!registry.contains(Ticker::AAPL, a.id()).unwrap());
        assert!(!registry.contains(Ticker::MSFT, a.id()).unwrap());
        assert_eq!(registry.remove_all(a.id(), &[Ticker::AAPL]).unwrap(), 0);
    }

    #[test]
    fn prune_everywhere_clears_every_symbol() {
        let registry = SubscriptionRegistry::new(&Catalog::default());
        let (a, b) = (sink(), sink());
        for ticker in [Ticker::AAPL, Ticker::MSFT, Ticker::TSLA] {
            registry.add_sink(ticker, &a).unwrap();
        }
        registry.add_sink(Ticker::MSFT, &b).unwrap();

        assert_eq!(registry.prune_everywhere(&[a.id()]).unwrap(), 3);
        for ticker in [Ticker::AAPL, Ticker::MSFT, Ticker::TSLA] {
            assert!(!registry.contains(ticker, a.id()).unwrap());
        }
        assert!(registry.contains(Ticker::MSFT, b.id()).unwrap());
        assert_eq!(registry.prune_everywhere(&[a.id()]).unwrap(), 0);
    }

    #[test]
    fn prune_removes_every_dead_id() {
        let registry = SubscriptionRegistry::new(&Catalog::default());
        let (a, b, c) = (sink(), sink(), sink());
        for s in [&a, &b, &c] {
            registry.add_sink(Ticker::AMZN, s).unwrap();
        }
        assert_eq!(registry.prune(Ticker::AMZN, &[a.id(), c.id()]).unwrap(), 2);
        let ids: Vec<_> = registry
            .snapshot(Ticker::AMZN)
            .unwrap()
            .iter()
            .map(|s| s.id())
            .collect();
        assert_eq!(ids, vec![b.id()]);
    }

    #[test]
    fn symbols_outside_the_catalog_are_rejected() {
        let catalog = Catalog::new(vec![Instrument::new(Ticker::AAPL, "Apple Inc.", 1.0, 1.0)]);
        let registry = SubscriptionRegistry::new(&catalog);
        assert!(matches!(
            registry.add_sink(Ticker::TSLA, &sink()),
            Err(FeedError::NotFound(_))
        ));
    }
}
