//! Errors surfaced to callers of the TCP backend.
//!
//! Only configuration and lifecycle failures are returned. Connection,
//! peer-closure and send failures are recovered inside the backend and never
//! reach a log-emitting caller.

use std::io;

use thiserror::Error;

use crate::endpoint::Endpoint;

/// Rejections returned by `add_server`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddServerError {
    /// The endpoint is already registered.
    #[error("server {0} already added")]
    DuplicateEndpoint(Endpoint),
    /// The registry already holds the configured maximum.
    #[error("no space for another tcp server (maximum {max})")]
    CapacityExceeded { max: usize },
    /// Storage for the new connection could not be reserved.
    #[error("cannot allocate connection record")]
    AllocationFailure,
}

/// Rejections returned by `remove_server`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RemoveServerError {
    #[error("server {0} is not registered")]
    UnknownEndpoint(Endpoint),
}

/// Failure to start the monitor loop.
#[derive(Debug, Error)]
pub enum StartError {
    /// A monitor loop is already running.
    #[error("tcp backend monitor loop is already running")]
    AlreadyRunning,
    /// A previous monitor loop has been told to stop but has not exited yet.
    #[error("tcp backend monitor loop is still stopping")]
    StillStopping,
    /// The monitor thread could not be spawned.
    #[error("failed to spawn tcp backend monitor thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Errors that may occur while building a backend.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Invalid user supplied configuration.
    #[error("invalid backend configuration: {0}")]
    InvalidConfig(String),
    /// The readiness poller could not be created.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// An initial server was rejected.
    #[error(transparent)]
    AddServer(#[from] AddServerError),
}
