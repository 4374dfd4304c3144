//! Query execution over generated SQL.
//!
//! Runs generated statements verbatim and materializes rows into
//! transport-safe records. Generated text that carries the upstream error
//! marker is never executed; it yields a distinguished skipped outcome so
//! the caller can tell "deliberately not attempted" apart from "zero rows".

use std::time::Instant;

use tracing::debug;

use crate::codec::{encode_record, Record};
use crate::db::DatabaseClient;
use crate::error::Result;
use crate::generator::ERROR_MARKER;

/// Result of running one generated statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// Execution was deliberately not attempted: the SQL text carried the
    /// upstream error marker.
    Skipped,

    /// The statement ran; zero rows yields an empty vector.
    Rows(Vec<Record>),
}

/// Executes generated SQL against a database client.
pub struct QueryExecutor<'a> {
    db: &'a dyn DatabaseClient,
}

impl<'a> QueryExecutor<'a> {
    /// Creates a new query executor.
    pub fn new(db: &'a dyn DatabaseClient) -> Self {
        Self { db }
    }

    /// Runs `sql` verbatim and materializes the result rows.
    ///
    /// Text containing the `"Error:"` marker short-circuits to
    /// [`ExecutionOutcome::Skipped`] without touching the database. Driver
    /// failures propagate as query errors.
    pub async fn execute(&self, sql: &str) -> Result<ExecutionOutcome> {
        if sql.contains(ERROR_MARKER) {
            debug!("Skipping execution: statement carries the error marker");
            return Ok(ExecutionOutcome::Skipped);
        }

        let start = Instant::now();
        let result = self.db.execute_query(sql).await?;

        debug!(
            rows = result.row_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query executed"
        );

        let records = result
            .rows
            .iter()
            .map(|row| encode_record(&result.columns, row))
            .collect();

        Ok(ExecutionOutcome::Rows(records))
    }
}
