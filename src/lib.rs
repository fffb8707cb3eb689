//! Log-forwarding backend shipping formatted records to remote TCP collectors.
//!
//! The logging facility hands every finished record to a [`FemtoBackend`].
//! [`FemtoTcpBackend`] broadcasts those bytes to each collector it currently
//! has a connection to and keeps retrying the ones it does not.

pub mod backend;
pub mod builder;
pub mod endpoint;
pub mod error;
pub mod file_config;
pub mod level;
pub mod rate_limited_warner;
pub mod tcp_backend;
pub mod tick;

pub use backend::FemtoBackend;
pub use builder::TcpBackendBuilder;
pub use endpoint::{Endpoint, ParseEndpointError};
pub use error::{AddServerError, BuildError, RemoveServerError, StartError};
pub use file_config::{FileConfigError, load_builder, parse_builder};
pub use level::FemtoLevel;
pub use tcp_backend::{
    ConnectionSnapshot, ConnectionStatus, Dialer, FanoutReport, FemtoTcpBackend, LifecycleState,
    TcpBackendConfig, TcpDialer,
};
pub use tick::{Clock, ManualClock, MonotonicClock, Tick};
