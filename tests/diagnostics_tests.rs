//! Diagnostics emitted through the `log` facade.

use std::{
    sync::{Arc, Once},
    time::Duration,
};

use femtologging_tcp::{FemtoBackend, FemtoTcpBackend, ManualClock, TcpBackendBuilder, Tick};
use logtest::Logger;
use serial_test::serial;

mod test_utils;
use test_utils::{Collector, RefusingDialer, wait_for};

/// `logtest::Logger::start` installs a process-global logger and may only be
/// called once per test binary; share it across tests and drop stale events.
fn start_logger() -> Logger {
    static START: Once = Once::new();
    START.call_once(|| {
        let _ = Logger::start();
    });
    let mut logger = Logger;
    drain(&mut logger);
    logger
}

fn drain(logger: &mut Logger) -> Vec<(log::Level, String)> {
    std::iter::from_fn(|| logger.pop())
        .map(|record| (record.level(), record.args().to_owned()))
        .collect()
}

fn refusing_backend() -> FemtoTcpBackend {
    TcpBackendBuilder::new()
        .build_with(
            Box::new(RefusingDialer),
            Arc::new(ManualClock::starting_at(Tick(0))),
        )
        .expect("build backend")
}

#[test]
#[serial]
fn connection_changes_are_logged() {
    let mut logger = start_logger();

    let backend = refusing_backend();
    backend
        .add_server(([10, 0, 0, 2], 9))
        .expect("add refused server");
    let records = drain(&mut logger);
    assert!(
        records.iter().any(|(level, msg)| *level == log::Level::Warn
            && msg.contains("connect to 10.0.0.2:9 failed")),
        "missing connect failure warning in {records:?}"
    );

    backend
        .remove_server(([10, 0, 0, 2], 9))
        .expect("remove server");
    let records = drain(&mut logger);
    assert!(
        records
            .iter()
            .any(|(level, msg)| *level == log::Level::Info && msg.contains("removed server")),
        "missing removal notice in {records:?}"
    );

    let collector = Collector::bind();
    let backend = TcpBackendBuilder::new()
        .with_poll_timeout_ms(20)
        .with_server(collector.endpoint())
        .build()
        .expect("build backend");
    backend.init().expect("init");
    let mut seen = Vec::new();
    let connected = wait_for(Duration::from_secs(3), || {
        seen.extend(drain(&mut logger));
        seen.iter()
            .any(|(level, msg)| *level == log::Level::Info && msg.contains("connected to"))
    });
    assert!(connected, "missing connect notice in {seen:?}");
    backend.deinit();
}

#[test]
#[serial]
fn output_path_never_logs() {
    let mut logger = start_logger();
    let backend = refusing_backend();
    backend
        .add_server(([10, 0, 0, 3], 9))
        .expect("add refused server");
    drain(&mut logger);

    for _ in 0..100 {
        backend.output(femtologging_tcp::FemtoLevel::Error, "app", false, b"record");
    }
    assert!(logger.pop().is_none());
}
