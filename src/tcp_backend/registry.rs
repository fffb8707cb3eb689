//! Ordered, bounded set of collector connections.
//!
//! Each [`Connection`] carries a [`ConnectionId`] that is never reused for the
//! life of the registry. The id doubles as the `mio` token of the connection's
//! socket, so a readiness event that arrives after its record was removed
//! simply finds nothing.

use log::debug;
use mio::{Registry, Token, net::TcpStream};

use crate::{endpoint::Endpoint, error::AddServerError, tick::Tick};

/// Stable identifier of one registry entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ConnectionId(usize);

impl ConnectionId {
    pub(crate) fn token(self) -> Token {
        Token(self.0)
    }

    pub(crate) fn from_token(token: Token) -> Self {
        Self(token.0)
    }
}

/// Socket state of a connection.
///
/// Only `Connecting` and `Up` own a socket, and only `Down` carries a retry
/// deadline.
#[derive(Debug)]
pub(crate) enum LinkState {
    Down { retry_at: Tick },
    Connecting { stream: TcpStream, expires_at: Tick },
    Up { stream: TcpStream },
}

/// Public view of a connection's state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Up,
    Connecting,
    Down { retry_at: Tick },
}

/// Point-in-time description of one registry entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub endpoint: Endpoint,
    pub status: ConnectionStatus,
}

/// One configured remote collector.
#[derive(Debug)]
pub(crate) struct Connection {
    id: ConnectionId,
    endpoint: Endpoint,
    pub(crate) link: LinkState,
}

impl Connection {
    pub(crate) fn id(&self) -> ConnectionId {
        self.id
    }

    pub(crate) fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Socket of an established connection.
    pub(crate) fn live_stream(&self) -> Option<&TcpStream> {
        match &self.link {
            LinkState::Up { stream, .. } => Some(stream),
            _ => None,
        }
    }

    pub(crate) fn has_socket(&self) -> bool {
        !matches!(self.link, LinkState::Down { .. })
    }

    pub(crate) fn status(&self) -> ConnectionStatus {
        match self.link {
            LinkState::Down { retry_at } => ConnectionStatus::Down { retry_at },
            LinkState::Connecting { .. } => ConnectionStatus::Connecting,
            LinkState::Up { .. } => ConnectionStatus::Up,
        }
    }

    /// Close the socket, if any, and mark the connection down until
    /// `retry_at`.
    pub(crate) fn close(&mut self, registrar: &Registry, retry_at: Tick) {
        let previous = std::mem::replace(&mut self.link, LinkState::Down { retry_at });
        if let LinkState::Connecting { mut stream, .. } | LinkState::Up { mut stream } = previous
            && let Err(err) = registrar.deregister(&mut stream)
        {
            debug!(
                "FemtoTcpBackend: deregistering {} failed: {err}",
                self.endpoint
            );
        }
    }
}

/// Bounded, insertion-ordered collection of connections.
#[derive(Debug)]
pub(crate) struct ConnectionRegistry {
    connections: Vec<Connection>,
    next_id: usize,
    max_servers: usize,
}

impl ConnectionRegistry {
    pub(crate) fn new(max_servers: usize) -> Self {
        Self {
            connections: Vec::new(),
            next_id: 0,
            max_servers,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.connections.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub(crate) fn contains(&self, endpoint: Endpoint) -> bool {
        self.connections.iter().any(|c| c.endpoint == endpoint)
    }

    /// Insert a down connection that is due for a connect at `now`.
    pub(crate) fn insert(
        &mut self,
        endpoint: Endpoint,
        now: Tick,
    ) -> Result<ConnectionId, AddServerError> {
        if self.contains(endpoint) {
            return Err(AddServerError::DuplicateEndpoint(endpoint));
        }
        if self.connections.len() >= self.max_servers {
            return Err(AddServerError::CapacityExceeded {
                max: self.max_servers,
            });
        }
        self.connections
            .try_reserve(1)
            .map_err(|_| AddServerError::AllocationFailure)?;
        let id = ConnectionId(self.next_id);
        self.next_id += 1;
        self.connections.push(Connection {
            id,
            endpoint,
            link: LinkState::Down { retry_at: now },
        });
        Ok(id)
    }

    pub(crate) fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        self.connections.iter_mut().find(|c| c.id == id)
    }

    /// Detach the record for `endpoint`; the caller owns closing it.
    pub(crate) fn remove(&mut self, endpoint: Endpoint) -> Option<Connection> {
        let index = self
            .connections
            .iter()
            .position(|c| c.endpoint == endpoint)?;
        Some(self.connections.remove(index))
    }

    /// Connections in insertion order; restartable for every cycle.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Connection> {
        self.connections.iter_mut()
    }

    /// Close every socket; with `destroy`, also drop every record.
    ///
    /// Records that survive are due for a connect at `retry_at`.
    pub(crate) fn close_all(&mut self, destroy: bool, registrar: &Registry, retry_at: Tick) {
        for conn in &mut self.connections {
            conn.close(registrar, retry_at);
        }
        if destroy {
            self.connections.clear();
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<ConnectionSnapshot> {
        self.connections
            .iter()
            .map(|c| ConnectionSnapshot {
                endpoint: c.endpoint,
                status: c.status(),
            })
            .collect()
    }
}
