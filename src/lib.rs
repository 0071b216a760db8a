//! qburst: a fixed-concurrency query load generator.
//!
//! qburst drives a pool of workers that hammer a query backend with randomly
//! chosen (template, parameter) pairs for a fixed wall-clock window, then folds
//! every worker's latency samples and error counts into one throughput/latency
//! report.
//!
//! # Architecture
//!
//! The main building blocks are:
//!
//! - [`ParameterCorpus`] and [`QueryTemplateSet`]: the immutable inputs, loaded once
//!   and shared read-only by every worker.
//! - [`QueryExecutor`]: the boundary to the backend under test. It takes a rendered
//!   query and returns a row count or an error.
//! - [`Worker`]: one request loop. Each worker times its requests, classifies the
//!   outcome as a [`QueryOutcome`] and folds it into its own [`WorkerResult`].
//! - [`StartCoordinator`]: the ready barrier, the broadcast release and the stop
//!   signal that bound the timed phase.
//! - [`monitor::monitor_task`]: periodic progress output and the single owner of the
//!   run duration.
//! - [`Runner`]: glue that ties everything together and returns a [`RunOutcome`].
//! - [`AggregateReport`] and [`Reporter`]: nearest-rank percentiles, throughput and
//!   the error histogram, printed as text or JSON.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use qburst::{
//!     AggregateReport, ParameterCorpus, Reporter, Runner, SimulatedExecutor,
//!     QueryTemplate, QueryTemplateSet, report::StdoutReporter,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let templates = QueryTemplateSet::new(vec![QueryTemplate::new("SELECT {param}")?])?;
//!     let corpus = ParameterCorpus::load("params.txt")?;
//!
//!     let outcome = Runner::builder()
//!         .workers(4)
//!         .duration(Duration::from_secs(2))
//!         .build()
//!         .run(
//!             Arc::new(SimulatedExecutor::builder().build()),
//!             Arc::new(templates),
//!             Arc::new(corpus),
//!         )
//!         .await?;
//!
//!     StdoutReporter.report(&AggregateReport::from(outcome)).await
//! }
//! ```
//!
//! # Feature flags
//! - `mysql`: enables `executor::MySqlExecutor`, a sqlx-backed executor.

/// Per-worker result records
pub mod aggregate;
/// Ready barrier, release gate and stop signal
pub mod coordinator;
/// Query parameters loaded from disk
pub mod corpus;
/// Shared success/error totals
pub mod counters;
pub mod error;
/// Backend boundary
pub mod executor;
/// Single request outcomes
pub mod metric;
/// Periodic progress and duration enforcement
pub mod monitor;
/// Percentiles, reports and reporters
pub mod report;
/// Orchestration of a run
pub mod runner;
/// Query templates
pub mod template;
/// The request loop
pub mod worker;

pub use aggregate::{Aggregate, WorkerResult};
pub use coordinator::{RunClock, StartCoordinator};
pub use corpus::ParameterCorpus;
pub use counters::RunCounters;
pub use error::BenchError;
pub use executor::{QueryExecutor, SimulatedExecutor};
pub use metric::{Metric, QueryOutcome};
pub use report::{percentile, AggregateReport, Reporter, RunOutcome};
pub use runner::Runner;
pub use template::{Dialect, QueryTemplate, QueryTemplateSet, VectorSearch};
pub use worker::{Worker, WorkerState};
