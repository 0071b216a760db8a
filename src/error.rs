use std::path::PathBuf;

use thiserror::Error;

/// Setup failures that abort a run before any timed work starts.
///
/// Per-request failures never show up here: they are measurement data and end up
/// in the error histogram of a [`crate::WorkerResult`].
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("failed to read parameter corpus {path}: {source}")]
    Corpus {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parameter corpus {0} contains no usable lines")]
    EmptyCorpus(PathBuf),
    #[error("no query parameters given")]
    NoParameters,
    #[error("query template must contain exactly one `{slot}` slot, found {found}")]
    TemplateSlot { slot: &'static str, found: usize },
    #[error("no query templates were built, check the table list")]
    NoTemplates,
    #[error("worker count must be at least 1")]
    NoWorkers,
    #[error("backend connection failed: {0}")]
    Connect(String),
}
