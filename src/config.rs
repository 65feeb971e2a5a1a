//! Overlay node configuration.

use std::time::Duration;

use crate::rpc::socket::{DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT};

/// Default interval between routing table refresh rounds.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
/// Overlay node configurations
pub struct Config {
    /// UDP port the overlay operates on.
    ///
    /// Addresses on the wire carry no port, so every peer is assumed to be
    /// reachable at this one, unless traffic from it reveals another.
    ///
    /// Defaults to [DEFAULT_PORT]
    pub port: u16,
    /// Explicit port to bind locally, when different from [Config::port].
    ///
    /// Useful to run several nodes on one host in tests; `Some(0)` binds an
    /// ephemeral port. Defaults to None, where the socket binds
    /// [Config::port] and falls back to an ephemeral port if it is taken.
    pub bind_port: Option<u16>,
    /// UDP socket request timeout duration.
    ///
    /// A request whose reply does not arrive within this window counts as
    /// a failed exchange, and the asked peer is treated as broken.
    ///
    /// Defaults to [DEFAULT_REQUEST_TIMEOUT]
    pub request_timeout: Duration,
    /// Interval between refresh rounds: verifying bucket fronts, rebuilding
    /// empty buckets and pulling fresh peers toward every prefix class.
    ///
    /// Defaults to [DEFAULT_REFRESH_INTERVAL]
    pub refresh_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_port: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}
