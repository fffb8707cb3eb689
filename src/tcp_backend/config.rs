//! Configuration structures consumed by the TCP backend.
//!
//! [`TcpBackendBuilder`](crate::builder::TcpBackendBuilder) validates and
//! constructs these values before passing them to
//! [`FemtoTcpBackend`](super::FemtoTcpBackend).

use std::time::Duration;

use crate::{endpoint::Endpoint, rate_limited_warner::DEFAULT_WARN_INTERVAL};

/// Default maximum number of collectors a backend manages.
pub const DEFAULT_MAX_SERVERS: usize = 8;
/// Default fixed delay between reconnect attempts to a down collector.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);
/// Default upper bound on one readiness wait.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(1);
/// Default bound on an in-flight connect before it counts as failed.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Runtime settings for a [`FemtoTcpBackend`](super::FemtoTcpBackend).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TcpBackendConfig {
    pub max_servers: usize,
    pub retry_interval: Duration,
    pub poll_timeout: Duration,
    pub connect_timeout: Duration,
    pub warn_interval: Duration,
    /// Collectors added when the backend is built.
    pub servers: Vec<Endpoint>,
}

impl Default for TcpBackendConfig {
    fn default() -> Self {
        Self {
            max_servers: DEFAULT_MAX_SERVERS,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            warn_interval: DEFAULT_WARN_INTERVAL,
            servers: Vec::new(),
        }
    }
}

impl TcpBackendConfig {
    /// Append a collector to the initial server list.
    pub fn with_server(mut self, endpoint: Endpoint) -> Self {
        self.servers.push(endpoint);
        self
    }
}
