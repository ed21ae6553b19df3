//! Per-connection snapshot loop.
//!
//! The poll variant does not share the broadcast: every poll connection runs
//! its own timer, recomputes a quote for each requested symbol with the
//! `PriceModel` and writes one `Frame::Update` per symbol, until the client
//! disconnects or the server shuts down. It touches neither the registry nor
//! the scheduler.

use crate::model::catalog::Catalog;
use crate::model::price_model::PriceModel;
use chrono::Utc;
use crossbeam_channel::{Receiver, select, tick};
use feed_common::{Frame, Result};
use log::{debug, info, warn};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

/// Snapshot loop settings shared by every poll connection.
#[derive(Clone)]
pub struct Poller {
    catalog: Arc<Catalog>,
    interval: Duration,
}

impl Poller {
    /// Poller over `catalog`, emitting every `interval`.
    pub fn new(catalog: Arc<Catalog>, interval: Duration) -> Self {
        Self { catalog, interval }
    }

    /// Write snapshots of `symbols` to `out` until `cancel` or `shutdown` fires
    /// or a write fails.
    ///
    /// An empty `symbols` list means every catalog symbol. Unknown symbols are
    /// logged and skipped. Returns the number of frames written.
    pub fn run<W: Write>(
        &self,
        symbols: &[String],
        out: &mut W,
        cancel: &Receiver<()>,
        shutdown: &Receiver<()>,
    ) -> Result<usize> {
        let symbols = if symbols.is_empty() {
            self.catalog.symbols()
        } else {
            symbols.to_vec()
        };
        info!(
            "Poll loop started for {} every {:?}",
            symbols.join(", "),
            self.interval
        );

        let ticker = tick(self.interval);
        let mut written = 0;

        loop {
            for symbol in &symbols {
                let instrument = match self.catalog.resolve(symbol) {
                    Ok(instrument) => instrument,
                    Err(e) => {
                        warn!("Poll skipped {}: {}", symbol, e);
                        continue;
                    }
                };
                let quote = PriceModel::quote(instrument, Utc::now());
                let line = Frame::Update { quote }.to_line()?;
                if let Err(e) = out.write_all(&line).and_then(|_| out.flush()) {
                    info!("Poll client gone after {} frames: {}", written, e);
                    return Ok(written);
                }
                written += 1;
            }

            select! {
                recv(cancel) -> _ => break,
                recv(shutdown) -> _ => break,
                recv(ticker) -> _ => {}
            }
        }

        debug!("Poll loop finished after {} frames", written);
        Ok(written)
    }
}
