use std::{fmt::Display, time::Duration};

/// Histogram key used when a query succeeds but returns no rows.
pub const NO_ROWS_KEY: &str = "No rows";

/// Default number of characters of an error message kept as its histogram key.
pub const DEFAULT_ERROR_KEY_LEN: usize = 50;

/// A `Metric` is a single observation produced by one request.
///
/// Metrics are consumed one at a time into a worker-local [`crate::Aggregate`]; they
/// are never shared between workers.
pub trait Metric
where
    Self: PartialOrd + PartialEq + Send + Sync + Clone,
{
}

/// The classified outcome of one query.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum QueryOutcome {
    /// At least one row came back.
    Success { latency_ms: f64, rows: usize },
    /// The executor reported an error; `key` is the truncated message.
    Failed { key: String },
    /// The executor succeeded but produced zero rows.
    NoRows,
}

impl Metric for QueryOutcome {}

impl QueryOutcome {
    /// Classify an executor result measured over `elapsed`.
    pub fn classify<E: Display>(
        result: Result<usize, E>,
        elapsed: Duration,
        key_len: usize,
    ) -> Self {
        match result {
            Ok(0) => Self::NoRows,
            Ok(rows) => Self::Success {
                latency_ms: elapsed.as_micros() as f64 / 1000.0,
                rows,
            },
            Err(e) => Self::Failed {
                key: error_key(&e.to_string(), key_len),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Reduce an error message to its histogram bucket.
///
/// Messages longer than `max_chars` characters keep their first `max_chars`
/// characters followed by `...`, so long messages that share a prefix land in the
/// same bucket.
pub fn error_key(message: &str, max_chars: usize) -> String {
    match message.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &message[..cut]),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "connection reset by peer while reading packet hdr:";

    #[test]
    fn prefix_is_fifty_chars() {
        assert_eq!(PREFIX.chars().count(), 50);
    }

    #[test]
    fn shared_prefix_collapses() {
        let a = error_key(&format!("{PREFIX} socket 17"), DEFAULT_ERROR_KEY_LEN);
        let b = error_key(&format!("{PREFIX} socket 42, retry later"), DEFAULT_ERROR_KEY_LEN);
        assert_eq!(a, b);
        assert_eq!(a, format!("{PREFIX}..."));
    }

    #[test]
    fn early_difference_stays_separate() {
        let a = error_key("login failed for user 'sa' reason 1 ..........................", 50);
        let b = error_key("login failed for user 'sb' reason 1 ..........................", 50);
        assert_ne!(a, b);
    }

    #[test]
    fn short_messages_are_untouched() {
        assert_eq!(error_key("timeout", 50), "timeout");
        assert_eq!(error_key(PREFIX, 50), PREFIX);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(error_key("ééééé", 2), "éé...");
    }

    #[test]
    fn classify_outcomes() {
        let ten = Duration::from_millis(10);
        assert_eq!(
            QueryOutcome::classify::<String>(Ok(3), ten, 50),
            QueryOutcome::Success {
                latency_ms: 10.0,
                rows: 3
            }
        );
        assert_eq!(
            QueryOutcome::classify::<String>(Ok(0), ten, 50),
            QueryOutcome::NoRows
        );
        assert_eq!(
            QueryOutcome::classify::<&str>(Err("bad"), ten, 50),
            QueryOutcome::Failed { key: "bad".into() }
        );
    }
}
