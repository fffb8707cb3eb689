//! Remote collector addresses.
//!
//! An [`Endpoint`] is an IPv4 address plus TCP port. It is immutable once a
//! connection has been created for it and is the key used to reject duplicate
//! registrations.

use std::{
    fmt,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    str::FromStr,
};

use thiserror::Error;

/// IPv4 address and port identifying one remote collector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    addr: Ipv4Addr,
    port: u16,
}

impl Endpoint {
    pub const fn new(addr: Ipv4Addr, port: u16) -> Self {
        Self { addr, port }
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Socket address used when dialling the collector.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.addr, self.port))
    }
}

impl From<([u8; 4], u16)> for Endpoint {
    fn from((octets, port): ([u8; 4], u16)) -> Self {
        Self::new(Ipv4Addr::from(octets), port)
    }
}

impl From<SocketAddrV4> for Endpoint {
    fn from(addr: SocketAddrV4) -> Self {
        Self::new(*addr.ip(), addr.port())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

/// Error returned when an endpoint string is not `a.b.c.d:port`.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid endpoint {0:?}: expected an IPv4 address and port such as 10.0.0.1:9")]
pub struct ParseEndpointError(pub String);

impl FromStr for Endpoint {
    type Err = ParseEndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<SocketAddrV4>()
            .map(Self::from)
            .map_err(|_| ParseEndpointError(s.to_owned()))
    }
}
