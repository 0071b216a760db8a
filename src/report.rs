use serde::{Deserialize, Serialize};
use std::{fmt, future::Future, time::Duration};

use crate::{aggregate::WorkerResult, monitor::Progress};

/// How many error buckets a report keeps by default.
pub const DEFAULT_TOP_ERRORS: usize = 10;

/// Nearest-rank percentile of an ascending `sorted` slice.
///
/// The value returned is `sorted[floor(p * len)]` (0-indexed), clamped to the last
/// element so `p = 1.0` stays in bounds. There is no interpolation: for
/// `[1, 2, ..., 10]`, p50 is `6` and p99 is `10`. An empty slice yields `0.0`.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p * sorted.len() as f64).floor() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

/// Everything the runner hands over once all workers have been joined.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub workers: usize,
    /// Wall-clock time from release to the last worker finishing.
    pub elapsed: Duration,
    /// Every worker's result merged together.
    pub result: WorkerResult,
    /// Shared success counter at the end of the run.
    pub successes: u64,
    /// Shared error counter at the end of the run.
    pub errors: u64,
    /// Progress samples the monitor logged during the timed phase.
    pub progress: Vec<Progress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBucket {
    pub key: String,
    pub count: u64,
}

/// The final throughput and latency summary of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub workers: usize,
    pub elapsed_secs: f64,
    pub successes: u64,
    pub qps: f64,
    pub p50_ms: f64,
    pub p99_ms: f64,
    pub total_errors: u64,
    /// Most frequent error buckets, highest count first.
    pub top_errors: Vec<ErrorBucket>,
    /// Live throughput at every monitor tick.
    pub progress: Vec<Progress>,
}

impl AggregateReport {
    pub fn new(outcome: RunOutcome, top_errors: usize) -> Self {
        let RunOutcome {
            workers,
            elapsed,
            result,
            successes: counted_successes,
            errors,
            progress,
        } = outcome;

        let mut latencies = result.latencies;
        latencies.sort_by(f64::total_cmp);
        let successes = latencies.len() as u64;
        if successes != counted_successes || result.errors.values().sum::<u64>() != errors {
            tracing::warn!(
                "Merged results ({successes} successes) disagree with run counters \
                 ({counted_successes} successes, {errors} errors)"
            );
        }

        let elapsed_secs = elapsed.as_secs_f64();
        let qps = if elapsed_secs > 0.0 {
            successes as f64 / elapsed_secs
        } else {
            0.0
        };

        let mut buckets: Vec<ErrorBucket> = result
            .errors
            .into_iter()
            .map(|(key, count)| ErrorBucket { key, count })
            .collect();
        buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
        buckets.truncate(top_errors);

        Self {
            workers,
            elapsed_secs,
            successes,
            qps,
            p50_ms: percentile(&latencies, 0.50),
            p99_ms: percentile(&latencies, 0.99),
            total_errors: errors,
            top_errors: buckets,
            progress,
        }
    }
}

impl From<RunOutcome> for AggregateReport {
    fn from(value: RunOutcome) -> Self {
        Self::new(value, DEFAULT_TOP_ERRORS)
    }
}

const RULE: &str = "==================================================";

impl fmt::Display for AggregateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{RULE}")?;
        writeln!(f, "Concurrency:   {}", self.workers)?;
        writeln!(f, "Total QPS:     {:.2}", self.qps)?;
        writeln!(f, "P50 Latency:   {:.2} ms", self.p50_ms)?;
        writeln!(f, "P99 Latency:   {:.2} ms", self.p99_ms)?;
        writeln!(f, "Errors:        {}", self.total_errors)?;
        writeln!(f, "{RULE}")?;
        if !self.top_errors.is_empty() {
            writeln!(f, "Top errors:")?;
            for bucket in &self.top_errors {
                writeln!(f, "  {:>8}  {}", bucket.count, bucket.key)?;
            }
        }
        Ok(())
    }
}

/// A [`Reporter`] takes a finished [`AggregateReport`] somewhere: stdout, a file,
/// another service.
///
/// Reports are plain data; all I/O lives here.
pub trait Reporter {
    fn report(
        &self,
        report: &AggregateReport,
    ) -> impl Future<Output = Result<(), Box<dyn std::error::Error>>>;
}

/// Prints the human-readable summary.
pub struct StdoutReporter;

impl Reporter for StdoutReporter {
    async fn report(&self, report: &AggregateReport) -> Result<(), Box<dyn std::error::Error>> {
        print!("{report}");
        Ok(())
    }
}

/// Prints the report as pretty JSON.
pub struct JsonReporter;

impl Reporter for JsonReporter {
    async fn report(&self, report: &AggregateReport) -> Result<(), Box<dyn std::error::Error>> {
        let value = serde_json::to_string_pretty(report)?;
        println!("{value}");
        Ok(())
    }
}
