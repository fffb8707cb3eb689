//! TCP log-forwarding backend.
//!
//! This module defines `FemtoTcpBackend`, which writes already formatted log
//! records to every reachable collector in a configured set. A monitor thread
//! multiplexes readiness over all sockets with `mio`, notices collectors that
//! closed their end, and retries down collectors at a fixed interval for as
//! long as the backend lives. Output never blocks on, or fails because of, an
//! unreachable collector; such records are dropped.

mod backend;
mod config;
mod connector;
mod fanout;
mod monitor;
mod registry;
mod scheduler;


pub use backend::{FemtoTcpBackend, LifecycleState};
pub use config::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_SERVERS, DEFAULT_POLL_TIMEOUT, DEFAULT_RETRY_INTERVAL,
    TcpBackendConfig,
};
pub use connector::{Dialer, TcpDialer};
pub use fanout::FanoutReport;
pub use registry::{ConnectionSnapshot, ConnectionStatus};
