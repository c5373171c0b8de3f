//! Query execution.
//!
//! The executor is the leaf of a conversational flow: a user asking "why
//! did my query fail?" is better served by a structured failure value than
//! by a propagated error. [`QueryExecutor::execute`] therefore converts
//! every failure mode (gate rejection, unreachable server, timeout, bad
//! SQL) into an [`ExecutionResult`] with `success: false` and never
//! returns an `Err`.

use crate::config::Timeouts;
use crate::db::connection::ScopedConnection;
use crate::db::types::rows_to_json;
use crate::guard;
use crate::models::ExecutionResult;
use std::time::Instant;
use tracing::{debug, info};

/// Executes vetted SQL over a scoped connection.
pub struct QueryExecutor {
    timeouts: Timeouts,
}

impl QueryExecutor {
    pub fn new(timeouts: Timeouts) -> Self {
        Self { timeouts }
    }

    /// Run a statement and return rows plus row count, or a structured
    /// failure.
    ///
    /// The read-only gate runs again here even though the orchestrator
    /// already gates generated SQL: this method is also reachable through
    /// the direct execute entry point, and must not trust its caller.
    pub async fn execute(&self, connection_string: &str, sql: &str) -> ExecutionResult {
        let authorized = match guard::authorize(sql) {
            Ok(authorized) => authorized,
            Err(e) => return ExecutionResult::failed(e.to_string(), sql),
        };

        let start = Instant::now();

        let mut conn = match ScopedConnection::open(connection_string, self.timeouts).await {
            Ok(conn) => conn,
            Err(e) => return ExecutionResult::failed(e.to_string(), sql),
        };

        debug!(sql = %authorized.as_str(), "Executing query");

        let rows = match conn.fetch_all(authorized.as_str()).await {
            Ok(rows) => rows,
            Err(e) => {
                // The connection drops here, closing the socket.
                return ExecutionResult::failed(e.to_string(), sql);
            }
        };
        conn.close().await;

        let json_rows = rows_to_json(&rows);
        info!(
            row_count = json_rows.len(),
            execution_time_ms = start.elapsed().as_millis() as u64,
            "Query executed"
        );

        ExecutionResult::ok(json_rows, sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn executor() -> QueryExecutor {
        QueryExecutor::new(Timeouts {
            connect: Duration::from_secs(2),
            statement: Duration::from_secs(2),
            query: Duration::from_secs(2),
        })
    }

    #[tokio::test]
    async fn test_execute_returns_failure_for_rejected_sql() {
        // No database needed: the gate rejects before any connection.
        let result = executor()
            .execute("postgres://u:p@127.0.0.1:1/db", "DROP TABLE users")
            .await;
        assert!(!result.success);
        assert_eq!(result.executed_query, "DROP TABLE users");
        assert!(result.error.unwrap().contains("Unsafe query rejected"));
    }

    #[tokio::test]
    async fn test_execute_returns_failure_for_refused_connection() {
        let result = executor()
            .execute("postgres://u:p@127.0.0.1:1/db", "SELECT 1")
            .await;
        assert!(!result.success);
        assert_eq!(result.executed_query, "SELECT 1");
        assert!(!result.error.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_execute_returns_failure_for_malformed_connection_string() {
        let result = executor().execute("not-a-url", "SELECT 1").await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("connection string"));
    }
}
