//! Best-effort broadcast of one record to every live collector.

use std::io::Write;

/// Outcome of one broadcast.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FanoutReport {
    /// Live connections a send was attempted on.
    pub attempted: usize,
    /// Sends that errored or accepted fewer bytes than offered.
    pub failed: usize,
}

impl FanoutReport {
    pub fn delivered(&self) -> usize {
        self.attempted - self.failed
    }
}

/// Write `payload` once to each sink.
///
/// Each sink gets exactly one `write` call. Errors and short writes are
/// counted and otherwise ignored; they never stop the remaining sends and are
/// never retried. Closure of a dead peer is left to the liveness probe.
pub(crate) fn broadcast<W, I>(sinks: I, payload: &[u8]) -> FanoutReport
where
    I: IntoIterator<Item = W>,
    W: Write,
{
    let mut report = FanoutReport::default();
    for mut sink in sinks {
        report.attempted += 1;
        match sink.write(payload) {
            Ok(written) if written == payload.len() => {}
            _ => report.failed += 1,
        }
    }
    report
}
