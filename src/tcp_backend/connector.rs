//! Non-blocking connection establishment.
//!
//! A connect is issued without waiting for the handshake. The socket is
//! registered for readiness immediately, and the monitor loop resolves the
//! outcome on the first event for it. Every attempt is reported through the
//! `log` facade; the diagnostics never influence what happens next.

use std::{
    io::{self, ErrorKind},
    time::Duration,
};

use log::{debug, info, warn};
use mio::{Interest, Registry, net::TcpStream};

use crate::{endpoint::Endpoint, tick::Tick};

use super::registry::{Connection, LinkState};

/// Opens the raw socket for a connect attempt.
///
/// Implementations must return a non-blocking stream whose connect has been
/// issued but not necessarily completed.
pub trait Dialer: Send + Sync {
    fn dial(&self, endpoint: Endpoint) -> io::Result<TcpStream>;
}

/// Dialer issuing a plain non-blocking TCP connect.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    fn dial(&self, endpoint: Endpoint) -> io::Result<TcpStream> {
        TcpStream::connect(endpoint.socket_addr())
    }
}

/// Result of resolving or starting a connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectOutcome {
    /// The handshake is still in flight.
    Pending,
    Connected,
    Failed,
    /// The connection already had a socket; nothing was done.
    Skipped,
}

/// Drives connections between `Down`, `Connecting` and `Up`.
pub(crate) struct Connector<'a> {
    dialer: &'a dyn Dialer,
    registrar: &'a Registry,
    retry_interval: Duration,
    connect_timeout: Duration,
}

impl<'a> Connector<'a> {
    pub(crate) fn new(
        dialer: &'a dyn Dialer,
        registrar: &'a Registry,
        retry_interval: Duration,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            dialer,
            registrar,
            retry_interval,
            connect_timeout,
        }
    }

    /// Start a connect for a connection without a socket.
    ///
    /// On failure the connection stays down with a retry deadline of
    /// `now + retry_interval`.
    pub(crate) fn connect(&self, conn: &mut Connection, now: Tick) -> ConnectOutcome {
        if conn.has_socket() {
            return ConnectOutcome::Skipped;
        }
        let endpoint = conn.endpoint();
        debug!("FemtoTcpBackend: connecting to {endpoint}");
        let mut stream = match self.dialer.dial(endpoint) {
            Ok(stream) => stream,
            Err(err) => {
                conn.link = LinkState::Down {
                    retry_at: self.retry_deadline(now),
                };
                warn!("FemtoTcpBackend: connect to {endpoint} failed: {err}");
                return ConnectOutcome::Failed;
            }
        };
        let interest = Interest::READABLE | Interest::WRITABLE;
        if let Err(err) = self.registrar.register(&mut stream, conn.id().token(), interest) {
            conn.link = LinkState::Down {
                retry_at: self.retry_deadline(now),
            };
            warn!("FemtoTcpBackend: cannot watch socket for {endpoint}: {err}");
            return ConnectOutcome::Failed;
        }
        conn.link = LinkState::Connecting {
            stream,
            expires_at: now.after(self.connect_timeout),
        };
        // Loopback and already-established peers may be connected before the
        // first readiness event arrives.
        self.resolve(conn, now)
    }

    /// Settle an in-flight connect after a readiness event.
    pub(crate) fn resolve(&self, conn: &mut Connection, now: Tick) -> ConnectOutcome {
        let endpoint = conn.endpoint();
        let token = conn.id().token();
        let LinkState::Connecting { stream, .. } = &mut conn.link else {
            return ConnectOutcome::Skipped;
        };
        let checked = match stream.take_error() {
            Ok(Some(err)) | Err(err) => Err(err),
            Ok(None) => match stream.peer_addr() {
                Ok(_) => Ok(true),
                Err(err) if is_in_progress(&err) => Ok(false),
                Err(err) => Err(err),
            },
        };
        match checked {
            Ok(false) => ConnectOutcome::Pending,
            Ok(true) => {
                if let Err(err) = self.registrar.reregister(stream, token, Interest::READABLE) {
                    warn!("FemtoTcpBackend: cannot watch socket for {endpoint}: {err}");
                    self.disconnect(conn, now);
                    return ConnectOutcome::Failed;
                }
                let previous = std::mem::replace(
                    &mut conn.link,
                    LinkState::Down {
                        retry_at: self.retry_deadline(now),
                    },
                );
                if let LinkState::Connecting { stream, .. } = previous {
                    conn.link = LinkState::Up { stream };
                }
                info!("FemtoTcpBackend: connected to {endpoint}");
                ConnectOutcome::Connected
            }
            Err(err) => {
                warn!("FemtoTcpBackend: connect to {endpoint} failed: {err}");
                self.disconnect(conn, now);
                ConnectOutcome::Failed
            }
        }
    }

    /// Fail a connect that has been in flight past its deadline.
    pub(crate) fn expire(&self, conn: &mut Connection, now: Tick) -> bool {
        match conn.link {
            LinkState::Connecting { expires_at, .. } if expires_at.has_elapsed(now) => {
                warn!(
                    "FemtoTcpBackend: connect to {} timed out after {:?}",
                    conn.endpoint(),
                    self.connect_timeout
                );
                self.disconnect(conn, now);
                true
            }
            _ => false,
        }
    }

    /// Close a connection's socket, keeping the record, and schedule the next
    /// attempt one retry interval after `now`.
    pub(crate) fn disconnect(&self, conn: &mut Connection, now: Tick) {
        conn.close(self.registrar, self.retry_deadline(now));
    }

    fn retry_deadline(&self, now: Tick) -> Tick {
        now.after(self.retry_interval)
    }
}

fn is_in_progress(err: &io::Error) -> bool {
    matches!(err.kind(), ErrorKind::NotConnected | ErrorKind::WouldBlock)
}
