//! Lock-free call counters.
//!
//! Counters are cumulative since the client was created and only ever grow.
//! They are updated outside the access serializer, so every field is atomic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Live counters owned by one client.
#[derive(Debug, Default)]
pub struct Metrics {
    requests_total: AtomicU64,
    errors_total: AtomicU64,
    processing_time_ms: AtomicU64,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Calls that reached the transport stage.
    pub requests_total: u64,
    /// Of those, calls that ended in any error.
    pub errors_total: u64,
    /// Sum of per-call wall-clock time, in milliseconds.
    pub processing_time_ms: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one finished call.
    ///
    /// Called exactly once per call attempt, whatever the outcome.
    pub fn record(&self, elapsed: Duration, failed: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.errors_total.fetch_add(1, Ordering::Relaxed);
        }
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.processing_time_ms.fetch_add(ms, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            errors_total: self.errors_total.load(Ordering::Relaxed),
            processing_time_ms: self.processing_time_ms.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "requests={} errors={} processing_time={}ms",
            self.requests_total, self.errors_total, self.processing_time_ms
        )
    }
}
