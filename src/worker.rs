use std::{
    fmt,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use rand::{rngs::StdRng, SeedableRng};
use tokio::{task::JoinHandle, time::Instant};

use crate::{
    aggregate::{Aggregate, WorkerResult},
    coordinator::StartCoordinator,
    corpus::ParameterCorpus,
    counters::RunCounters,
    executor::QueryExecutor,
    metric::QueryOutcome,
    template::QueryTemplateSet,
};

/// Lifecycle of a worker task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Retrying the backend liveness check.
    Connecting,
    /// Registered with the coordinator, waiting for release.
    Ready,
    /// Issuing requests.
    Running,
    /// Stop observed; the last request has completed.
    Draining,
    /// Result handed back.
    Done,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// Per-request knobs every worker shares.
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    /// Maximum rows consumed per request.
    pub output_limit: usize,
    /// Pause between failed liveness checks.
    pub ping_backoff: Duration,
    /// Characters of an error message kept as its histogram key.
    pub error_key_len: usize,
}

/// Shared state handed to every worker.
pub struct WorkerContext<Q> {
    pub executor: Arc<Q>,
    pub templates: Arc<QueryTemplateSet>,
    pub corpus: Arc<ParameterCorpus>,
    pub coordinator: Arc<StartCoordinator>,
    pub counters: Arc<RunCounters>,
    pub settings: WorkerSettings,
}

// `derive(Clone)` would require `Q: Clone`.
impl<Q> Clone for WorkerContext<Q> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            templates: Arc::clone(&self.templates),
            corpus: Arc::clone(&self.corpus),
            coordinator: Arc::clone(&self.coordinator),
            counters: Arc::clone(&self.counters),
            settings: self.settings,
        }
    }
}

/// One execution loop against the backend.
pub struct Worker<Q> {
    id: usize,
    ctx: WorkerContext<Q>,
    state: WorkerState,
}

impl<Q> Worker<Q>
where
    Q: QueryExecutor + 'static,
{
    pub fn new(id: usize, ctx: WorkerContext<Q>) -> Self {
        Self {
            id,
            ctx,
            state: WorkerState::Connecting,
        }
    }

    fn transition(&mut self, next: WorkerState) {
        tracing::debug!("Worker {} {} -> {}", self.id, self.state, next);
        self.state = next;
    }

    /// Seed from wall-clock nanoseconds plus the worker id so workers started in the
    /// same instant still draw different sequences.
    fn rng(&self) -> StdRng {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        StdRng::seed_from_u64(nanos.wrapping_add(self.id as u64))
    }

    /// Retry the liveness check until it succeeds. There is no upper bound: a dead
    /// backend stalls the run before the timed phase instead of skewing it.
    async fn connect(&mut self) {
        let backoff = self.ctx.settings.ping_backoff;
        loop {
            match self.ctx.executor.ping().await {
                Ok(()) => break,
                Err(e) => {
                    tracing::warn!(
                        "Worker {} liveness check failed: {e}, retrying in {backoff:?}",
                        self.id
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// Drive the worker through its whole lifecycle and return what it measured.
    pub async fn run(mut self) -> WorkerResult {
        let mut result = WorkerResult::new();
        let mut rng = self.rng();

        self.connect().await;
        self.transition(WorkerState::Ready);
        self.ctx.coordinator.register_ready();
        self.ctx.coordinator.wait_release().await;
        self.transition(WorkerState::Running);

        let WorkerSettings {
            output_limit,
            error_key_len,
            ..
        } = self.ctx.settings;

        while !self.ctx.coordinator.is_stopped() {
            let query = {
                let template = self.ctx.templates.pick(&mut rng);
                template.render(self.ctx.corpus.pick(&mut rng))
            };

            let t0 = Instant::now();
            let res = self.ctx.executor.query(&query, output_limit).await;
            let outcome = QueryOutcome::classify(res, t0.elapsed(), error_key_len);

            if outcome.is_success() {
                self.ctx.counters.record_success();
            } else {
                self.ctx.counters.record_error();
            }
            result.consume(&outcome);

            // A backend that answers without suspending must not pin this thread.
            tokio::task::yield_now().await;
        }

        self.transition(WorkerState::Draining);
        tracing::debug!(
            "Worker {} finished with {} successes and {} errors",
            self.id,
            result.successes(),
            result.error_total()
        );
        self.transition(WorkerState::Done);
        result
    }
}

/// Spawns `workers` Tokio tasks, one [`Worker`] each.
///
/// Every handle resolves to that worker's [`WorkerResult`] once its loop has
/// exited, which is the only point the result becomes visible to anyone else.
pub fn spawn_workers<Q>(workers: usize, ctx: WorkerContext<Q>) -> Vec<JoinHandle<WorkerResult>>
where
    Q: QueryExecutor + 'static,
{
    (0..workers)
        .map(|i| {
            let worker = Worker::new(i, ctx.clone());
            tracing::debug!("Worker {i} spawned.");
            tokio::spawn(worker.run())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{executor::SimulatedExecutor, metric::NO_ROWS_KEY, template::QueryTemplate};
    use tokio::time::timeout;

    fn context(exec: SimulatedExecutor, workers: usize) -> WorkerContext<SimulatedExecutor> {
        WorkerContext {
            executor: Arc::new(exec),
            templates: Arc::new(
                QueryTemplateSet::new(vec![QueryTemplate::new("q {param}").unwrap()]).unwrap(),
            ),
            corpus: Arc::new(ParameterCorpus::from_lines(["1", "2"]).unwrap()),
            coordinator: Arc::new(StartCoordinator::new(workers)),
            counters: Arc::new(RunCounters::new()),
            settings: WorkerSettings {
                output_limit: 10,
                ping_backoff: Duration::from_millis(500),
                error_key_len: 50,
            },
        }
    }

    #[tokio::test]
    async fn spawn_expected_number_of_workers() {
        let ctx = context(SimulatedExecutor::builder().build(), 10);
        let workers = spawn_workers(10, ctx.clone());
        assert_eq!(workers.len(), 10);

        ctx.coordinator.wait_all_ready().await;
        ctx.coordinator.stop();
        ctx.coordinator.release_start();
        for w in workers {
            let result = w.await.unwrap();
            assert_eq!(result.successes(), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn connecting_retries_until_ping_succeeds() {
        let ctx = context(SimulatedExecutor::builder().ping_failures(3).build(), 1);
        let handle = tokio::spawn(Worker::new(0, ctx.clone()).run());

        ctx.coordinator.wait_all_ready().await;
        assert_eq!(ctx.executor.pings(), 4);
        ctx.coordinator.stop();
        ctx.coordinator.release_start();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn worker_classifies_every_outcome() {
        let exec = SimulatedExecutor::builder()
            .fail_every(Some(2))
            .error_message("deadlock victim")
            .build();
        let ctx = context(exec, 1);
        let handle = tokio::spawn(Worker::new(0, ctx.clone()).run());

        ctx.coordinator.wait_all_ready().await;
        ctx.coordinator.release_start();
        tokio::time::sleep(Duration::from_millis(95)).await;
        ctx.coordinator.stop();
        let result = handle.await.unwrap();

        assert_eq!(result.successes(), ctx.counters.successes());
        assert_eq!(result.error_total(), ctx.counters.errors());
        assert_eq!(result.errors.get("deadlock victim"), Some(&ctx.counters.errors()));
        assert!(result.successes() > 0);
        assert!(result.latencies.iter().all(|&ms| ms == 10.0));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_rows_count_as_errors() {
        let ctx = context(SimulatedExecutor::builder().rows(0).build(), 1);
        let handle = tokio::spawn(Worker::new(0, ctx.clone()).run());

        ctx.coordinator.wait_all_ready().await;
        ctx.coordinator.release_start();
        tokio::time::sleep(Duration::from_millis(35)).await;
        ctx.coordinator.stop();
        let result = handle.await.unwrap();

        assert!(result.latencies.is_empty());
        assert_eq!(ctx.counters.successes(), 0);
        assert_eq!(result.errors.get(NO_ROWS_KEY), Some(&ctx.counters.errors()));
        assert!(ctx.counters.errors() >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_request_drains_after_stop() {
        let exec = SimulatedExecutor::builder()
            .latency(Duration::from_secs(1))
            .build();
        let ctx = context(exec, 1);
        let handle = tokio::spawn(Worker::new(0, ctx.clone()).run());

        ctx.coordinator.wait_all_ready().await;
        ctx.coordinator.release_start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        ctx.coordinator.stop();

        let result = timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker should exit within one request")
            .unwrap();
        assert_eq!(result.successes(), 1);
        assert_eq!(result.latencies, vec![1000.0]);
        assert_eq!(ctx.executor.queries(), 1);
    }
}
