//! Public backend type exported by the crate.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use log::{debug, info, warn};
use mio::{Poll, Registry, Waker};
use parking_lot::Mutex;

use crate::{
    backend::FemtoBackend,
    builder::validate_config,
    endpoint::Endpoint,
    error::{AddServerError, BuildError, RemoveServerError, StartError},
    level::FemtoLevel,
    rate_limited_warner::RateLimitedWarner,
    tick::{Clock, MonotonicClock},
};

use super::{
    config::TcpBackendConfig,
    connector::{Connector, Dialer, TcpDialer},
    fanout::{FanoutReport, broadcast},
    monitor::{MonitorLoop, WAKE_TOKEN},
    registry::{Connection, ConnectionRegistry, ConnectionSnapshot},
};

/// Extra time granted to the monitor thread beyond two wait timeouts.
const SHUTDOWN_SLACK: Duration = Duration::from_millis(250);

/// Lifecycle of the monitor loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    Stopped = 0,
    Running = 1,
    Stopping = 2,
}

impl LifecycleState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Lifecycle(AtomicU8);

impl Lifecycle {
    fn new() -> Self {
        Self(AtomicU8::new(LifecycleState::Stopped as u8))
    }

    pub(crate) fn load(&self) -> LifecycleState {
        LifecycleState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn is_running(&self) -> bool {
        self.load() == LifecycleState::Running
    }

    /// Move from `from` to `to`; false if another state was observed.
    fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn store(&self, state: LifecycleState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// State shared between caller contexts and the monitor thread.
pub(crate) struct Shared {
    pub(crate) config: TcpBackendConfig,
    pub(crate) registry: Mutex<ConnectionRegistry>,
    pub(crate) poller: Mutex<Poll>,
    pub(crate) registrar: Registry,
    waker: Waker,
    pub(crate) lifecycle: Lifecycle,
    dialer: Box<dyn Dialer>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) warner: RateLimitedWarner,
}

impl Shared {
    pub(crate) fn connector(&self) -> Connector<'_> {
        Connector::new(
            self.dialer.as_ref(),
            &self.registrar,
            self.config.retry_interval,
            self.config.connect_timeout,
        )
    }
}

struct Worker {
    handle: thread::JoinHandle<()>,
    done_rx: Receiver<()>,
}

/// Backend forwarding formatted log records to a set of TCP collectors.
///
/// Records are written unframed to every established connection. A
/// dedicated monitor thread detects collectors that went away and reconnects
/// them at a fixed interval for as long as the backend exists.
///
/// Diagnostics are emitted through the `log` facade. Do not route this
/// crate's own log target back into the same backend instance.
pub struct FemtoTcpBackend {
    pub(super) shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl FemtoTcpBackend {
    /// Construct a backend with the default configuration and no servers.
    pub fn new() -> Result<Self, BuildError> {
        Self::with_config(TcpBackendConfig::default())
    }

    /// Construct the backend from a configuration object.
    ///
    /// Servers listed in the configuration are added, and a connect is
    /// issued for each, before this returns.
    pub fn with_config(config: TcpBackendConfig) -> Result<Self, BuildError> {
        Self::with_parts(config, Box::new(TcpDialer), Arc::new(MonotonicClock::new()))
    }

    /// Construct the backend with a custom dialer and tick source.
    pub fn with_parts(
        config: TcpBackendConfig,
        dialer: Box<dyn Dialer>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, BuildError> {
        validate_config(&config)?;
        let poll = Poll::new()?;
        let registrar = poll.registry().try_clone()?;
        let waker = Waker::new(poll.registry(), WAKE_TOKEN)?;
        let servers = config.servers.clone();
        let backend = Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(ConnectionRegistry::new(config.max_servers)),
                poller: Mutex::new(poll),
                registrar,
                waker,
                lifecycle: Lifecycle::new(),
                dialer,
                clock,
                warner: RateLimitedWarner::new(config.warn_interval),
                config,
            }),
            worker: Mutex::new(None),
        };
        for endpoint in servers {
            backend.add_server(endpoint)?;
        }
        Ok(backend)
    }

    /// Register a collector and issue a connect to it.
    pub fn add_server(&self, endpoint: impl Into<Endpoint>) -> Result<(), AddServerError> {
        let endpoint = endpoint.into();
        let now = self.shared.clock.now();
        let mut registry = self.shared.registry.lock();
        let id = registry.insert(endpoint, now).inspect_err(|err| {
            warn!("FemtoTcpBackend: cannot add server: {err}");
        })?;
        if let Some(conn) = registry.get_mut(id) {
            self.shared.connector().connect(conn, now);
        }
        Ok(())
    }

    /// Close and forget a collector immediately.
    ///
    /// Records already handed to the socket are left to the kernel; nothing
    /// is drained first.
    pub fn remove_server(&self, endpoint: impl Into<Endpoint>) -> Result<(), RemoveServerError> {
        let endpoint = endpoint.into();
        let mut registry = self.shared.registry.lock();
        let mut conn = registry
            .remove(endpoint)
            .ok_or(RemoveServerError::UnknownEndpoint(endpoint))?;
        conn.close(&self.shared.registrar, self.shared.clock.now());
        info!("FemtoTcpBackend: removed server {endpoint}");
        Ok(())
    }

    /// Start the monitor thread.
    pub fn start(&self) -> Result<(), StartError> {
        let mut worker = self.worker.lock();
        self.reap_finished_worker(&mut worker);
        if !self
            .shared
            .lifecycle
            .transition(LifecycleState::Stopped, LifecycleState::Running)
        {
            return Err(match self.shared.lifecycle.load() {
                LifecycleState::Stopping => StartError::StillStopping,
                _ => StartError::AlreadyRunning,
            });
        }
        let (done_tx, done_rx) = bounded(1);
        let monitor = MonitorLoop::new(Arc::clone(&self.shared));
        let spawned = thread::Builder::new()
            .name("femto-tcp-monitor".into())
            .spawn(move || monitor.run(done_tx));
        match spawned {
            Ok(handle) => {
                *worker = Some(Worker { handle, done_rx });
                Ok(())
            }
            Err(err) => {
                self.shared.lifecycle.store(LifecycleState::Stopped);
                warn!("FemtoTcpBackend: monitor thread start failed: {err}");
                Err(StartError::Spawn(err))
            }
        }
    }

    /// Join a monitor thread that has already exited.
    ///
    /// Covers a monitor that died on its own (state still `Running`) and one
    /// that outlived an earlier shutdown's grace period (state `Stopping`).
    fn reap_finished_worker(&self, worker: &mut Option<Worker>) {
        if worker.as_ref().is_some_and(|w| w.handle.is_finished()) {
            if let Some(w) = worker.take()
                && w.handle.join().is_err()
            {
                warn!("FemtoTcpBackend: monitor thread panicked");
            }
            self.shared.lifecycle.store(LifecycleState::Stopped);
        }
    }

    /// Stop the monitor thread and wait for it, leaving sockets open.
    ///
    /// If the monitor does not acknowledge within the grace period the state
    /// stays `Stopping` and the thread is kept, so no second loop can start
    /// until it has been joined by a later `shutdown` or `start`.
    pub fn shutdown(&self) {
        let mut worker = self.worker.lock();
        let signalled = self
            .shared
            .lifecycle
            .transition(LifecycleState::Running, LifecycleState::Stopping);
        if !signalled && self.shared.lifecycle.load() != LifecycleState::Stopping {
            return;
        }
        if let Err(err) = self.shared.waker.wake() {
            debug!("FemtoTcpBackend: waking monitor failed: {err}");
        }
        let Some(Worker { handle, done_rx }) = worker.take() else {
            self.shared.lifecycle.store(LifecycleState::Stopped);
            return;
        };
        let grace = self
            .shared
            .config
            .poll_timeout
            .saturating_mul(2)
            .saturating_add(SHUTDOWN_SLACK);
        match done_rx.recv_timeout(grace) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    warn!("FemtoTcpBackend: monitor thread panicked");
                }
                self.shared.lifecycle.store(LifecycleState::Stopped);
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("FemtoTcpBackend: monitor thread did not stop within {grace:?}");
                *worker = Some(Worker { handle, done_rx });
            }
        }
    }

    /// Stop the monitor, then close every socket and drop every record.
    pub fn teardown(&self) {
        self.shutdown();
        let mut registry = self.shared.registry.lock();
        if !registry.is_empty() {
            registry.close_all(true, &self.shared.registrar, self.shared.clock.now());
            info!("FemtoTcpBackend: closed all connections");
        }
    }

    /// Write `log` to every established connection.
    pub fn fan_out(&self, log: &[u8]) -> FanoutReport {
        let report = {
            let registry = self.shared.registry.lock();
            broadcast(registry.iter().filter_map(Connection::live_stream), log)
        };
        self.shared.warner.record_drops(report.failed as u64);
        report
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.lifecycle.load()
    }

    pub fn server_count(&self) -> usize {
        self.shared.registry.lock().len()
    }

    /// Current state of every registered collector, in insertion order.
    pub fn snapshot(&self) -> Vec<ConnectionSnapshot> {
        self.shared.registry.lock().snapshot()
    }

    pub fn config(&self) -> &TcpBackendConfig {
        &self.shared.config
    }
}

impl FemtoBackend for FemtoTcpBackend {
    fn init(&self) -> Result<(), StartError> {
        self.start()
    }

    fn deinit(&self) {
        self.teardown();
    }

    fn output(&self, _level: FemtoLevel, _tag: &str, _is_raw: bool, log: &[u8]) {
        self.fan_out(log);
    }

    fn flush(&self) {
        self.shared.warner.flush(|count| {
            warn!("FemtoTcpBackend dropped {count} records due to send errors");
        });
    }
}

impl Drop for FemtoTcpBackend {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for FemtoTcpBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FemtoTcpBackend")
            .field("state", &self.state())
            .field("servers", &self.server_count())
            .field("config", &self.shared.config)
            .finish()
    }
}
