use futures::TryStreamExt;
use sqlx::{
    mysql::{MySqlPool, MySqlPoolOptions},
    Row,
};

use super::QueryExecutor;
use crate::error::BenchError;

/// Backend reached through a sqlx MySQL connection pool.
///
/// Each query is streamed and only the first `limit` rows are pulled; the first
/// column of every row is decoded as an `i64` id.
#[derive(Debug, Clone)]
pub struct MySqlExecutor {
    pool: MySqlPool,
}

impl MySqlExecutor {
    /// Connect a pool sized for `workers` concurrent requests.
    ///
    /// Failing to connect here is fatal; the run has not started yet.
    pub async fn connect(url: &str, workers: usize) -> Result<Self, BenchError> {
        let max = u32::try_from(workers.saturating_mul(3)).unwrap_or(u32::MAX);
        let pool = MySqlPoolOptions::new()
            .max_connections(max)
            .min_connections(u32::try_from(workers).unwrap_or(u32::MAX).min(max))
            .connect(url)
            .await
            .map_err(|e| BenchError::Connect(e.to_string()))?;
        Ok(Self { pool })
    }
}

impl QueryExecutor for MySqlExecutor {
    type Error = sqlx::Error;

    async fn ping(&self) -> Result<(), Self::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn query(&self, query: &str, limit: usize) -> Result<usize, Self::Error> {
        let mut rows = sqlx::raw_sql(query).fetch(&self.pool);
        let mut consumed = 0;
        while consumed < limit {
            match rows.try_next().await? {
                Some(row) => {
                    row.try_get::<i64, _>(0)?;
                    consumed += 1;
                }
                None => break,
            }
        }
        Ok(consumed)
    }
}
