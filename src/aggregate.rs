use std::{collections::HashMap, fmt::Debug};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::metric::{Metric, QueryOutcome, NO_ROWS_KEY};

/// The `Aggregate` trait defines how [`Metric`] values are collected into a
/// mergeable, worker-local record.
///
/// Aggregates hold raw data only. Derived statistics such as percentiles and
/// throughput belong in [`crate::AggregateReport`], computed once after every
/// worker has finished.
///
/// # Implementor notes
/// - `merge` must be **associative** and **commutative**: worker results are merged
///   in whatever order the workers are joined.
/// - `consume` sits on the hot path of every request and must not lock.
pub trait Aggregate
where
    Self: Serialize + DeserializeOwned + Send + Sync + Debug + Clone,
{
    /// The metric type this aggregate summarizes.
    type Metric: Metric;

    /// Create a new, empty instance of the aggregate.
    fn new() -> Self;

    /// Incorporate a single metric into the aggregate.
    fn consume(&mut self, metric: &Self::Metric);

    /// Combine two different aggregates into one.
    fn merge(&mut self, other: Self);
}

/// What a single worker observed during the timed phase.
///
/// Latencies are kept in arrival order (milliseconds); errors are counted per
/// truncated message key. A worker owns its `WorkerResult` exclusively until its
/// loop has exited and it hands the value back through its join handle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    pub latencies: Vec<f64>,
    pub errors: HashMap<String, u64>,
}

impl WorkerResult {
    pub fn with_capacity(latencies: usize) -> Self {
        Self {
            latencies: Vec::with_capacity(latencies),
            errors: HashMap::new(),
        }
    }

    /// Number of successful requests recorded.
    pub fn successes(&self) -> u64 {
        self.latencies.len() as u64
    }

    /// Sum of every error bucket, "No rows" included.
    pub fn error_total(&self) -> u64 {
        self.errors.values().sum()
    }
}

impl Aggregate for WorkerResult {
    type Metric = QueryOutcome;

    fn new() -> Self {
        Self::with_capacity(10_000)
    }

    fn consume(&mut self, metric: &Self::Metric) {
        match metric {
            QueryOutcome::Success { latency_ms, .. } => self.latencies.push(*latency_ms),
            QueryOutcome::Failed { key } => *self.errors.entry(key.clone()).or_default() += 1,
            QueryOutcome::NoRows => *self.errors.entry(NO_ROWS_KEY.to_string()).or_default() += 1,
        }
    }

    fn merge(&mut self, other: Self) {
        self.latencies.extend(other.latencies);
        for (key, count) in other.errors {
            *self.errors.entry(key).or_default() += count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(ms: f64) -> QueryOutcome {
        QueryOutcome::Success {
            latency_ms: ms,
            rows: 1,
        }
    }

    fn failed(key: &str) -> QueryOutcome {
        QueryOutcome::Failed { key: key.into() }
    }

    fn worker(outcomes: &[QueryOutcome]) -> WorkerResult {
        let mut w = WorkerResult::new();
        outcomes.iter().for_each(|o| w.consume(o));
        w
    }

    fn sorted(mut v: Vec<f64>) -> Vec<f64> {
        v.sort_by(f64::total_cmp);
        v
    }

    #[test]
    fn consume_routes_outcomes() {
        let w = worker(&[success(1.5), failed("x"), QueryOutcome::NoRows, failed("x")]);
        assert_eq!(w.latencies, vec![1.5]);
        assert_eq!(w.errors.get("x"), Some(&2));
        assert_eq!(w.errors.get(NO_ROWS_KEY), Some(&1));
        assert_eq!(w.successes(), 1);
        assert_eq!(w.error_total(), 3);
    }

    #[test]
    fn merge_order_does_not_matter() {
        let a = worker(&[success(3.0), success(1.0), failed("a")]);
        let b = worker(&[success(2.0), failed("b"), failed("a")]);
        let c = worker(&[QueryOutcome::NoRows, success(9.0)]);

        let orders = [
            [&a, &b, &c],
            [&a, &c, &b],
            [&b, &a, &c],
            [&b, &c, &a],
            [&c, &a, &b],
            [&c, &b, &a],
        ];
        let merged: Vec<WorkerResult> = orders
            .iter()
            .map(|order| {
                let mut acc = WorkerResult::new();
                order.iter().for_each(|w| acc.merge((*w).clone()));
                acc
            })
            .collect();

        let first = &merged[0];
        for m in &merged[1..] {
            assert_eq!(m.successes(), first.successes());
            assert_eq!(m.error_total(), first.error_total());
            assert_eq!(m.errors, first.errors);
            assert_eq!(sorted(m.latencies.clone()), sorted(first.latencies.clone()));
        }
        assert_eq!(first.successes(), 4);
        assert_eq!(first.errors.get("a"), Some(&2));
    }

    #[test]
    fn merging_empty_is_identity() {
        let mut a = worker(&[success(4.0), failed("e")]);
        let before = a.clone();
        a.merge(WorkerResult::new());
        assert_eq!(a, before);
    }
}
