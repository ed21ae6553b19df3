//! Command-line arguments and runtime configuration of the feed server.
//!
//! `Args` is the `clap` interface; `ServerConfig` is what the rest of the
//! server consumes. Every value has a default, so the server runs without any
//! flags.
use crate::scheduler::SchedulerConfig;
use clap::Parser;
use feed_common::net::{self, DEFAULT_PORT, POLL_INTERVAL_MS, PUSH_TIMEOUT_MS, TICK_INTERVAL_MS};
use std::time::Duration;

/// Write timeout for acknowledgements, unary answers and poll frames.
const CLIENT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Interface to listen on.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// TCP port for commands and streams.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Broadcast interval in milliseconds.
    #[arg(long, default_value_t = TICK_INTERVAL_MS, value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_ms: u64,

    /// Upper bound for one push to one subscriber, in milliseconds.
    #[arg(long, default_value_t = PUSH_TIMEOUT_MS)]
    pub push_timeout_ms: u64,

    /// Snapshot interval of `poll` connections in milliseconds.
    #[arg(long, default_value_t = POLL_INTERVAL_MS, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_ms: u64,
}

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// `host:port` to bind.
    pub bind_addr: String,
    /// Broadcast timing.
    pub scheduler: SchedulerConfig,
    /// Snapshot interval of `poll` connections.
    pub poll_interval: Duration,
    /// Write timeout outside the broadcast path.
    pub write_timeout: Duration,
    /// Oldest broadcast quote a `get` may return before a fresh one is computed.
    pub quote_max_age: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let scheduler = SchedulerConfig::default();
        Self {
            bind_addr: net::addr("0.0.0.0", DEFAULT_PORT),
            scheduler,
            poll_interval: Duration::from_millis(POLL_INTERVAL_MS),
            write_timeout: CLIENT_WRITE_TIMEOUT,
            quote_max_age: scheduler.interval * 2,
        }
    }
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        let interval = Duration::from_millis(args.tick_ms);
        Self {
            bind_addr: net::addr(&args.host, args.port),
            scheduler: SchedulerConfig {
                interval,
                push_timeout: Duration::from_millis(args.push_timeout_ms),
                tick_budget: interval,
            },
            poll_interval: Duration::from_millis(args.poll_ms),
            write_timeout: CLIENT_WRITE_TIMEOUT,
            quote_max_age: interval * 2,
        }
    }
}
