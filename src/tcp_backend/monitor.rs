//! Monitor thread multiplexing readiness across every collector socket.
//!
//! Each cycle waits on the poller for at most `poll_timeout`, runs the
//! reconnect scheduler, then reacts to the sockets that became ready:
//! in-flight connects are settled and established connections are probed for
//! peer closure. Bytes a collector sends are read and discarded; the protocol
//! is outbound only.

use std::{
    io::{self, ErrorKind, Read},
    sync::Arc,
    thread,
};

use crossbeam_channel::Sender;
use log::{debug, info, warn};
use mio::{Events, Interest, Token, net::TcpStream};

use super::{
    backend::Shared,
    registry::{ConnectionId, LinkState},
    scheduler::{ReconnectPass, ReconnectScheduler},
};

/// Token reserved for the shutdown waker.
pub(crate) const WAKE_TOKEN: Token = Token(usize::MAX);

/// Scratch space for bytes a collector sends; they are discarded.
const DISCARD_BUF_LEN: usize = 512;

/// Reads spent draining one ready socket before yielding to the others.
const MAX_DISCARD_READS: usize = 64;

/// What one monitoring cycle observed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct CycleReport {
    pub(crate) reconnect: ReconnectPass,
    /// Socket readiness events handled (the waker is not counted).
    pub(crate) ready: usize,
    pub(crate) resolved: usize,
    pub(crate) closed: usize,
    /// Sockets re-armed because their receive queue was not fully drained.
    pub(crate) rearmed: usize,
}

/// Result of probing an established connection.
#[derive(Debug)]
enum Liveness {
    Alive,
    /// Data is still queued; readiness must be re-armed to see the rest.
    Backlogged,
    PeerClosed,
    Failed(io::Error),
}

/// Drain what the peer sent until the socket would block.
///
/// Readiness is edge-triggered, so stopping early without re-arming would
/// hide a queued FIN behind unread data.
fn probe(stream: &TcpStream) -> Liveness {
    let mut buf = [0u8; DISCARD_BUF_LEN];
    let mut reader = stream;
    let mut reads = 0;
    while reads < MAX_DISCARD_READS {
        match reader.read(&mut buf) {
            Ok(0) => return Liveness::PeerClosed,
            Ok(_) => reads += 1,
            Err(err) if err.kind() == ErrorKind::WouldBlock => return Liveness::Alive,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Liveness::Failed(err),
        }
    }
    Liveness::Backlogged
}

pub(crate) struct MonitorLoop {
    shared: Arc<Shared>,
    events: Events,
}

impl MonitorLoop {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        let capacity = shared.config.max_servers.saturating_add(1);
        Self {
            shared,
            events: Events::with_capacity(capacity),
        }
    }

    /// Run cycles until the backend leaves the running state.
    pub(crate) fn run(mut self, done_tx: Sender<()>) {
        debug!("FemtoTcpBackend: monitor loop started");
        while self.shared.lifecycle.is_running() {
            if let Err(err) = self.run_cycle() {
                warn!("FemtoTcpBackend: readiness wait failed: {err}");
                thread::sleep(self.shared.config.poll_timeout);
            }
        }
        debug!("FemtoTcpBackend: monitor loop stopped");
        let _ = done_tx.send(());
    }

    /// Execute one wait-then-react cycle.
    pub(crate) fn run_cycle(&mut self) -> io::Result<CycleReport> {
        self.wait()?;

        let now = self.shared.clock.now();
        let connector = self.shared.connector();
        let mut registry = self.shared.registry.lock();
        let mut report = CycleReport {
            reconnect: ReconnectScheduler::run(&mut registry, &connector, now),
            ..CycleReport::default()
        };

        for event in self.events.iter() {
            if event.token() == WAKE_TOKEN {
                continue;
            }
            report.ready += 1;
            let Some(conn) = registry.get_mut(ConnectionId::from_token(event.token())) else {
                continue;
            };
            let liveness = match &conn.link {
                LinkState::Connecting { .. } => None,
                LinkState::Up { stream } => Some(probe(stream)),
                LinkState::Down { .. } => continue,
            };
            let Some(liveness) = liveness else {
                connector.resolve(conn, now);
                report.resolved += 1;
                continue;
            };
            match liveness {
                Liveness::Alive => {}
                Liveness::Backlogged => {
                    let LinkState::Up { stream } = &mut conn.link else {
                        continue;
                    };
                    match self.shared.registrar.reregister(
                        stream,
                        event.token(),
                        Interest::READABLE,
                    ) {
                        Ok(()) => report.rearmed += 1,
                        Err(err) => {
                            warn!(
                                "FemtoTcpBackend: cannot watch socket for {}: {err}; closing",
                                conn.endpoint()
                            );
                            connector.disconnect(conn, now);
                            report.closed += 1;
                        }
                    }
                }
                Liveness::PeerClosed => {
                    info!(
                        "FemtoTcpBackend: connection to {} closed by peer",
                        conn.endpoint()
                    );
                    connector.disconnect(conn, now);
                    report.closed += 1;
                }
                Liveness::Failed(err) => {
                    warn!(
                        "FemtoTcpBackend: connection to {} failed: {err}; closing",
                        conn.endpoint()
                    );
                    connector.disconnect(conn, now);
                    report.closed += 1;
                }
            }
        }
        drop(registry);

        self.shared.warner.warn_if_due(|count| {
            warn!("FemtoTcpBackend dropped {count} records due to send errors");
        });
        Ok(report)
    }

    fn wait(&mut self) -> io::Result<()> {
        let mut poller = self.shared.poller.lock();
        match poller.poll(&mut self.events, Some(self.shared.config.poll_timeout)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => {
                self.events.clear();
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}
