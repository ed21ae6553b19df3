//! Real-time quote distribution engine.
//!
//! The server keeps a fixed catalog of instruments and, on a fixed cadence,
//! computes one synthetic quote per instrument and fans it out to every
//! subscriber of that symbol. Building blocks:
//!
//! - `model::registry::SubscriptionRegistry` — per-symbol sets of weak sink
//!   references, each behind its own lock.
//! - `scheduler::BroadcastScheduler` — the tick loop. One quote per symbol per
//!   tick, bounded pushes, pruning of dead sinks.
//! - `session::SubscriberSession` — all-or-nothing registration of one stream
//!   and guaranteed removal on cancel, shutdown or drop.
//! - `service::FeedService` — unary `get`/`list`, streaming subscriptions and
//!   the independent `poll` loop over newline-delimited JSON.
//! - `receiver::FeedListener` — the TCP accept loop.
#![warn(missing_docs)]

pub mod config;
pub mod model;
pub mod poller;
pub mod receiver;
pub mod scheduler;
pub mod service;
pub mod session;
