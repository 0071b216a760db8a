use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use thiserror::Error;
use typed_builder::TypedBuilder;

use super::QueryExecutor;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct SimError(pub String);

/// Deterministic in-process backend.
///
/// Every query sleeps for `latency` and then returns `rows` (capped at the requested
/// limit). With `fail_every = Some(n)` each n-th query fails with `error_message`
/// after the same delay, and the first `ping_failures` pings fail so the connecting
/// phase can be exercised.
#[derive(Debug, TypedBuilder)]
pub struct SimulatedExecutor {
    #[builder(default = Duration::from_millis(10))]
    pub latency: Duration,
    #[builder(default = 1)]
    pub rows: usize,
    #[builder(default)]
    pub fail_every: Option<u64>,
    #[builder(default = String::from("simulated backend failure"), setter(into))]
    pub error_message: String,
    #[builder(default)]
    pub ping_failures: u64,
    #[builder(default, setter(skip))]
    queries: AtomicU64,
    #[builder(default, setter(skip))]
    pings: AtomicU64,
}

impl SimulatedExecutor {
    /// Number of queries received so far.
    pub fn queries(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    /// Number of ping attempts received so far, failed ones included.
    pub fn pings(&self) -> u64 {
        self.pings.load(Ordering::Relaxed)
    }
}

impl QueryExecutor for SimulatedExecutor {
    type Error = SimError;

    async fn ping(&self) -> Result<(), Self::Error> {
        let attempt = self.pings.fetch_add(1, Ordering::Relaxed);
        if attempt < self.ping_failures {
            return Err(SimError(format!("ping attempt {attempt} refused")));
        }
        Ok(())
    }

    async fn query(&self, _query: &str, limit: usize) -> Result<usize, Self::Error> {
        let n = self.queries.fetch_add(1, Ordering::Relaxed) + 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match self.fail_every {
            Some(every) if every > 0 && n % every == 0 => Err(SimError(self.error_message.clone())),
            _ => Ok(self.rows.min(limit)),
        }
    }
}
