use std::sync::atomic::{AtomicU64, Ordering};

/// Run-wide totals incremented by every worker and sampled by the monitor.
///
/// Only monotonic increments and snapshot reads happen, so relaxed atomics are
/// enough; the final values are read after every worker has been joined.
#[derive(Debug, Default)]
pub struct RunCounters {
    successes: AtomicU64,
    errors: AtomicU64,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}
