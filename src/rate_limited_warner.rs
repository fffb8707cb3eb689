use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Default minimum spacing between drop summaries.
pub const DEFAULT_WARN_INTERVAL: Duration = Duration::from_secs(5);

/// Counts records that could not be delivered and rate limits the summary.
///
/// Producers call [`record_drops`](Self::record_drops) from the output path,
/// which never logs. The monitor loop calls [`warn_if_due`](Self::warn_if_due)
/// once per cycle; the callback runs at most once per interval and only when
/// something was dropped. [`flush`](Self::flush) reports immediately.
#[derive(Debug)]
pub struct RateLimitedWarner {
    origin: Instant,
    interval_ms: u64,
    last_warn_ms: AtomicU64,
    dropped: AtomicU64,
    warned_once: AtomicBool,
}

impl RateLimitedWarner {
    /// Create a warner whose first summary can be emitted immediately.
    pub fn new(interval: Duration) -> Self {
        Self {
            origin: Instant::now(),
            interval_ms: interval.as_millis().min(u128::from(u64::MAX)) as u64,
            last_warn_ms: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            warned_once: AtomicBool::new(false),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.origin.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
    }

    /// Add `count` to the dropped-record counter.
    pub fn record_drops(&self, count: u64) {
        if count > 0 {
            self.dropped.fetch_add(count, Ordering::Relaxed);
        }
    }

    /// Number of drops not yet reported.
    pub fn pending(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Invoke `warn` with the pending count if the interval has elapsed.
    pub fn warn_if_due(&self, warn: impl FnOnce(u64)) {
        let now = self.elapsed_ms();
        let first = !self.warned_once.load(Ordering::Relaxed);
        let prev = self.last_warn_ms.load(Ordering::Relaxed);
        if !first && now.saturating_sub(prev) < self.interval_ms {
            return;
        }
        let count = self.dropped.swap(0, Ordering::Relaxed);
        if count > 0 {
            warn(count);
            self.last_warn_ms.store(now, Ordering::Relaxed);
            self.warned_once.store(true, Ordering::Relaxed);
        }
    }

    /// Immediately report any pending drops.
    pub fn flush(&self, warn: impl FnOnce(u64)) {
        let count = self.dropped.swap(0, Ordering::Relaxed);
        if count > 0 {
            warn(count);
            self.last_warn_ms.store(self.elapsed_ms(), Ordering::Relaxed);
            self.warned_once.store(true, Ordering::Relaxed);
        }
    }
}

impl Default for RateLimitedWarner {
    fn default() -> Self {
        Self::new(DEFAULT_WARN_INTERVAL)
    }
}
