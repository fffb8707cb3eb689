//! End-to-end tests driving `FemtoTcpBackend` with its monitor thread.

use std::{io::Read, sync::Arc, time::Duration};

use femtologging_tcp::{
    ConnectionStatus, FemtoBackend, FemtoLevel, FemtoTcpBackend, LifecycleState, ManualClock,
    StartError, TcpBackendBuilder, TcpDialer, Tick,
};
use rstest::{fixture, rstest};

mod test_utils;
use test_utils::{Collector, refused_endpoint, status_of, wait_for};

const WAIT: Duration = Duration::from_secs(3);

#[fixture]
fn builder() -> TcpBackendBuilder {
    TcpBackendBuilder::new()
        .with_retry_interval_ms(100)
        .with_poll_timeout_ms(20)
        .with_connect_timeout_ms(500)
}

#[rstest]
fn records_reach_live_collectors_only(builder: TcpBackendBuilder) {
    let a = Collector::bind();
    let b = refused_endpoint();
    let backend = builder
        .with_server(a.endpoint())
        .with_server(b)
        .build()
        .expect("build backend");
    backend.init().expect("init");

    assert!(wait_for(WAIT, || {
        status_of(&backend, a.endpoint()) == Some(ConnectionStatus::Up)
    }));
    assert!(matches!(
        status_of(&backend, b),
        Some(ConnectionStatus::Down { .. })
    ));

    let mut peer = a.accept();
    backend.output(FemtoLevel::Info, "app", false, b"hello");
    let mut buf = [0u8; 5];
    peer.read_exact(&mut buf).expect("read payload");
    assert_eq!(&buf, b"hello");

    backend.deinit();
    assert_eq!(backend.server_count(), 0);
    assert_eq!(backend.state(), LifecycleState::Stopped);
}

#[rstest]
fn monitor_thread_reconnects_after_peer_close(builder: TcpBackendBuilder) {
    let collector = Collector::bind();
    let backend = builder
        .with_server(collector.endpoint())
        .build()
        .expect("build backend");
    backend.init().expect("init");

    let is_up = || status_of(&backend, collector.endpoint()) == Some(ConnectionStatus::Up);
    assert!(wait_for(WAIT, is_up));
    drop(collector.accept());

    assert!(wait_for(WAIT, || {
        matches!(
            status_of(&backend, collector.endpoint()),
            Some(ConnectionStatus::Down { .. })
        )
    }));
    assert_eq!(backend.server_count(), 1);

    assert!(wait_for(WAIT, is_up), "reconnected after retry interval");
    let mut peer = collector.accept();
    backend.output(FemtoLevel::Warn, "app", false, b"again");
    let mut buf = [0u8; 5];
    peer.read_exact(&mut buf).expect("read payload");
    assert_eq!(&buf, b"again");
}

#[rstest]
fn server_added_while_running_is_connected(builder: TcpBackendBuilder) {
    let backend = builder.build().expect("build backend");
    backend.init().expect("init");
    let collector = Collector::bind();
    backend.add_server(collector.endpoint()).expect("add");
    assert!(wait_for(WAIT, || {
        status_of(&backend, collector.endpoint()) == Some(ConnectionStatus::Up)
    }));
}

#[rstest]
fn init_twice_is_rejected(builder: TcpBackendBuilder) {
    let backend = builder.build().expect("build backend");
    backend.init().expect("first init");
    assert!(matches!(backend.init(), Err(StartError::AlreadyRunning)));
    backend.deinit();
    backend.init().expect("init after deinit");
}

#[rstest]
fn dropping_a_running_backend_closes_collectors(builder: TcpBackendBuilder) {
    let collector = Collector::bind();
    let backend = builder
        .with_server(collector.endpoint())
        .build()
        .expect("build backend");
    backend.init().expect("init");
    assert!(wait_for(WAIT, || {
        status_of(&backend, collector.endpoint()) == Some(ConnectionStatus::Up)
    }));
    let mut peer = collector.accept();
    drop(backend);
    let mut buf = [0u8; 1];
    assert_eq!(peer.read(&mut buf).expect("eof"), 0);
}

#[rstest]
fn works_behind_a_trait_object() {
    let backend: Box<dyn FemtoBackend> = Box::new(
        FemtoTcpBackend::with_parts(
            Default::default(),
            Box::new(TcpDialer),
            Arc::new(ManualClock::starting_at(Tick(0))),
        )
        .expect("build backend"),
    );
    backend.init().expect("init");
    backend.output(FemtoLevel::Debug, "app", true, b"nobody listens");
    backend.flush();
    backend.deinit();
}
