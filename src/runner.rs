//! Runner: orchestration of one timed benchmark run
//!
//! The [`Runner`] owns the control flow around the workers:
//!
//! 1. Spawn N [`crate::Worker`] tasks sharing the templates, the corpus, the
//!    coordinator and the run counters.
//! 2. Wait on the ready barrier until every worker has a usable connection.
//! 3. Take the start instant and release all workers with one broadcast.
//! 4. Spawn the monitor, which logs progress and calls `stop` once `duration` has
//!    elapsed.
//! 5. Join every worker handle, merging each [`WorkerResult`] as it comes back,
//!    then join the monitor and keep the progress samples it logged.
//!
//! The elapsed time used for throughput runs from release until the last worker
//! has drained, so a request still in flight at stop time is counted in both the
//! numerator and the denominator.
//!
//! # Tuning knobs
//! - `workers`: the only bound on in-flight requests. There is no rate limiting.
//! - `tick`: monitor period. It does not affect when the run stops.
//! - `ping_backoff`: pause between failed liveness checks while connecting.
//! - `error_key_len`: how many characters of an error message identify its bucket.
use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use tokio::time::Instant;
use typed_builder::TypedBuilder;

use crate::{
    aggregate::{Aggregate, WorkerResult},
    coordinator::StartCoordinator,
    corpus::ParameterCorpus,
    counters::RunCounters,
    error::BenchError,
    executor::QueryExecutor,
    metric::DEFAULT_ERROR_KEY_LEN,
    monitor::monitor_task,
    report::RunOutcome,
    template::QueryTemplateSet,
    worker::{spawn_workers, WorkerContext, WorkerSettings},
};

#[derive(Debug, Clone, TypedBuilder)]
pub struct Runner {
    /// The number of concurrent worker tasks to spawn.
    pub workers: usize,
    /// How long the timed phase lasts.
    pub duration: Duration,
    /// Maximum rows consumed per request.
    #[builder(default = 10)]
    pub output_limit: usize,
    /// Monitor progress period.
    #[builder(default = Duration::from_secs(5))]
    pub tick: Duration,
    /// Pause between failed liveness checks.
    #[builder(default = Duration::from_millis(500))]
    pub ping_backoff: Duration,
    /// Characters of an error message kept as its histogram key.
    #[builder(default = DEFAULT_ERROR_KEY_LEN)]
    pub error_key_len: usize,
}

impl Runner {
    /// Execute one run and return the merged results.
    ///
    /// Only setup problems are errors here. Once workers are spawned the run always
    /// completes; failing requests end up in the error histogram.
    pub async fn run<Q>(
        &self,
        executor: Arc<Q>,
        templates: Arc<QueryTemplateSet>,
        corpus: Arc<ParameterCorpus>,
    ) -> Result<RunOutcome, BenchError>
    where
        Q: QueryExecutor + 'static,
    {
        if self.workers == 0 {
            return Err(BenchError::NoWorkers);
        }
        if templates.is_empty() {
            return Err(BenchError::NoTemplates);
        }

        let coordinator = Arc::new(StartCoordinator::new(self.workers));
        let counters = Arc::new(RunCounters::new());
        let ctx = WorkerContext {
            executor,
            templates,
            corpus,
            coordinator: coordinator.clone(),
            counters: counters.clone(),
            settings: WorkerSettings {
                output_limit: self.output_limit,
                ping_backoff: self.ping_backoff,
                error_key_len: self.error_key_len,
            },
        };

        tracing::info!("Ramping up {} workers...", self.workers);
        let handles = spawn_workers(self.workers, ctx);

        coordinator.wait_all_ready().await;
        tracing::info!("All connections ready. Running for {:?}!", self.duration);

        let started = Instant::now();
        coordinator.release_start();
        let monitor = tokio::spawn(monitor_task(
            coordinator.clone(),
            counters.clone(),
            started,
            self.duration,
            self.tick.max(Duration::from_millis(1)),
        ));

        tracing::info!("Retrieving data from workers...");
        let mut merged = WorkerResult::new();
        for (i, res) in join_all(handles).await.into_iter().enumerate() {
            match res {
                Ok(result) => merged.merge(result),
                // One panicked worker should not throw away everyone else's data.
                Err(e) => tracing::error!("Worker {i} panicked with error: {e}"),
            }
        }
        let elapsed = started.elapsed();

        let progress = match monitor.await {
            Ok(progress) => progress,
            Err(e) => {
                tracing::error!("Monitor task failed: {e}");
                Vec::new()
            }
        };

        tracing::info!("Done: {} successes, {} errors", counters.successes(), counters.errors());
        Ok(RunOutcome {
            workers: self.workers,
            elapsed,
            result: merged,
            successes: counters.successes(),
            errors: counters.errors(),
            progress,
        })
    }
}
