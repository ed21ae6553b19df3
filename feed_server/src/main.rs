//! Quote feed server binary.
//!
//! Wires the catalog, subscription registry and quote book into a broadcast
//! scheduler and a TCP listener, then runs until Ctrl+C. On shutdown every
//! open stream is released, the scheduler is stopped and the process exits;
//! the listener thread is not joined.
use clap::Parser;
use crossbeam_channel::{bounded, select};
use feed_common::{FeedError, Result};
use feed_server::config::{Args, ServerConfig};
use feed_server::model::catalog::Catalog;
use feed_server::model::quote_book::QuoteBook;
use feed_server::model::registry::SubscriptionRegistry;
use feed_server::receiver::FeedListener;
use feed_server::scheduler::BroadcastScheduler;
use feed_server::service::FeedService;
use log::{error, info};
use std::sync::Arc;
use std::thread;

fn main() -> Result<()> {
    init_logger();
    let config = ServerConfig::from(Args::parse());
    info!("Starting feed server with {:?}", config);

    let catalog = Arc::new(Catalog::default());
    let registry = Arc::new(SubscriptionRegistry::new(&catalog));
    let book = Arc::new(QuoteBook::new());

    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    let (ctrl_tx, ctrl_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = ctrl_tx.try_send(());
    })
    .map_err(|e| FeedError::Format(format!("cannot install the Ctrl+C handler: {}", e)))?;

    let scheduler = BroadcastScheduler::new(
        Arc::clone(&catalog),
        Arc::clone(&registry),
        Arc::clone(&book),
        config.scheduler,
    )
    .start()?;

    let service = Arc::new(FeedService::new(
        catalog,
        registry,
        book,
        &config,
        shutdown_rx,
    ));
    let listener = FeedListener::bind(&config.bind_addr)?;
    let (done_tx, done_rx) = bounded::<()>(1);
    thread::Builder::new()
        .name("feed-listener".into())
        .spawn(move || {
            if let Err(e) = listener.run(service) {
                error!("Listener failed: {}", e);
            }
            drop(done_tx);
        })?;

    select! {
        recv(ctrl_rx) -> _ => info!("Ctrl+C received, shutting down"),
        recv(done_rx) -> _ => error!("Listener stopped, shutting down"),
    }

    drop(shutdown_tx);
    scheduler.stop();
    info!("Feed server stopped");
    Ok(())
}

fn init_logger() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}
