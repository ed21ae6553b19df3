//! Shared networking constants and helpers used by client and server.

/// TCP port the feed server listens on for commands and streams.
pub const DEFAULT_PORT: u16 = 8080;
/// Interval between two broadcast ticks.
pub const TICK_INTERVAL_MS: u64 = 500;
/// Upper bound for a single push to one subscriber.
pub const PUSH_TIMEOUT_MS: u64 = 100;
/// Interval between two snapshots on a `poll` connection.
pub const POLL_INTERVAL_MS: u64 = 500;

/// Helper to format an address with a port like "ip:port".
pub fn addr(ip: &str, port: u16) -> String {
    format!("{}:{}", ip, port)
}
