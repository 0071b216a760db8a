//! QueryExecutor: the boundary to the backend under test
//!
//! The harness never interprets queries. It hands a fully rendered query string to
//! a [`QueryExecutor`] and gets back either the number of rows consumed or an error.
//! Everything behind that call (connection pooling, wire protocol, result decoding)
//! belongs to the implementation.
//!
//! # Contract
//! - [`QueryExecutor::ping`] is a liveness check. Workers call it in a retry loop
//!   before registering as ready, so it should be cheap and must not panic.
//! - [`QueryExecutor::query`] consumes **at most** `limit` rows. Reading further rows
//!   is wasted work that inflates the measured latency.
//! - A decode failure on a row abandons the rest of the scan and is reported as an
//!   error, not as a partial success.
//! - Implementations are shared by every worker through an `Arc`, so they must be
//!   `Send + Sync` and their futures `Send`.
//!
//! Two implementations ship with the crate: [`SimulatedExecutor`], a deterministic
//! in-process stub, and `MySqlExecutor` (feature `mysql`) built on sqlx.
pub mod sim;
pub use sim::SimulatedExecutor;

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "mysql")]
pub use mysql::MySqlExecutor;

use std::{fmt::Display, future::Future};

/// The backend being benchmarked.
pub trait QueryExecutor
where
    Self: Send + Sync,
{
    type Error: Display + Send;

    /// Check that the backend is reachable and usable.
    fn ping(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Run `query`, consuming at most `limit` result rows, and return how many rows
    /// were consumed.
    fn query(
        &self,
        query: &str,
        limit: usize,
    ) -> impl Future<Output = Result<usize, Self::Error>> + Send;
}
