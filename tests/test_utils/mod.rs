//! Loopback collectors shared by the integration tests.

#![allow(dead_code)]

use std::{
    io::{self, ErrorKind},
    net::{SocketAddr, TcpListener, TcpStream},
    time::{Duration, Instant},
};

use femtologging_tcp::{ConnectionStatus, Dialer, Endpoint, FemtoTcpBackend};

/// A collector listening on an ephemeral loopback port.
pub struct Collector {
    listener: TcpListener,
    endpoint: Endpoint,
}

impl Collector {
    pub fn bind() -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind collector");
        let endpoint = endpoint_of(&listener);
        Self { listener, endpoint }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Accept the backend's connection with a bounded read timeout.
    pub fn accept(&self) -> TcpStream {
        let (stream, _) = self.listener.accept().expect("accept backend connection");
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("set read timeout");
        stream
    }
}

fn endpoint_of(listener: &TcpListener) -> Endpoint {
    match listener.local_addr().expect("listener address") {
        SocketAddr::V4(addr) => Endpoint::from(addr),
        SocketAddr::V6(_) => panic!("expected an IPv4 listener"),
    }
}

/// A loopback endpoint with no listener behind it.
pub fn refused_endpoint() -> Endpoint {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind throwaway listener");
    endpoint_of(&listener)
}

/// Dialer that refuses every attempt without touching the network.
pub struct RefusingDialer;

impl Dialer for RefusingDialer {
    fn dial(&self, _endpoint: Endpoint) -> io::Result<mio::net::TcpStream> {
        Err(io::Error::from(ErrorKind::ConnectionRefused))
    }
}

pub fn status_of(backend: &FemtoTcpBackend, endpoint: Endpoint) -> Option<ConnectionStatus> {
    backend
        .snapshot()
        .into_iter()
        .find(|s| s.endpoint == endpoint)
        .map(|s| s.status)
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}
