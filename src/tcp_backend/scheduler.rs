//! Fixed-interval reconnection.
//!
//! There is no backoff growth, jitter or attempt limit: a down collector is
//! retried every `retry_interval` until the backend is torn down.

use crate::tick::Tick;

use super::{
    connector::{ConnectOutcome, Connector},
    registry::{ConnectionRegistry, LinkState},
};

/// Counts from one scheduler pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ReconnectPass {
    pub(crate) attempted: usize,
    pub(crate) connected: usize,
    pub(crate) expired: usize,
}

/// Decides once per monitoring cycle which connections to retry.
pub(crate) struct ReconnectScheduler;

impl ReconnectScheduler {
    /// Fail overdue connects, then issue one connect per due down entry.
    pub(crate) fn run(
        registry: &mut ConnectionRegistry,
        connector: &Connector<'_>,
        now: Tick,
    ) -> ReconnectPass {
        let mut pass = ReconnectPass::default();
        for conn in registry.iter_mut() {
            if connector.expire(conn, now) {
                pass.expired += 1;
            }
            let LinkState::Down { retry_at } = conn.link else {
                continue;
            };
            if !retry_at.has_elapsed(now) {
                continue;
            }
            pass.attempted += 1;
            if connector.connect(conn, now) == ConnectOutcome::Connected {
                pass.connected += 1;
            }
        }
        pass
    }
}
