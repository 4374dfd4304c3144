//! Mock database clients for testing.
//!
//! `MockDatabaseClient` serves a scripted schema and scripted query results,
//! recording every statement it executes so tests can assert which SQL (if
//! any) actually reached the database. `FailingDatabaseClient` rejects every
//! operation, for exercising error paths.

use super::{ColumnInfo, DatabaseClient, QueryResult, Value};
use crate::catalog::TableDescriptor;
use crate::error::{AskdbError, Result};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// A mock database client that returns predefined results.
pub struct MockDatabaseClient {
    tables: Vec<TableDescriptor>,
    scripted_results: Vec<(String, QueryResult)>,
    executed: Mutex<Vec<String>>,
}

impl MockDatabaseClient {
    /// Creates a new mock database client with an empty schema.
    pub fn new() -> Self {
        Self {
            tables: Vec::new(),
            scripted_results: Vec::new(),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Creates a new mock database client with the given tables.
    pub fn with_tables(tables: Vec<TableDescriptor>) -> Self {
        Self {
            tables,
            scripted_results: Vec::new(),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Scripts a result for any executed SQL containing `pattern`.
    pub fn with_result(mut self, pattern: impl Into<String>, result: QueryResult) -> Self {
        self.scripted_results.push((pattern.into(), result));
        self
    }

    /// Returns every SQL statement this client has executed.
    pub fn executed_queries(&self) -> Vec<String> {
        self.executed.lock().expect("mock lock poisoned").clone()
    }
}

impl Default for MockDatabaseClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn introspect_tables(&self) -> Result<Vec<TableDescriptor>> {
        Ok(self.tables.clone())
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        self.executed
            .lock()
            .expect("mock lock poisoned")
            .push(sql.to_string());

        for (pattern, result) in &self.scripted_results {
            if sql.contains(pattern.as_str()) {
                return Ok(result.clone());
            }
        }

        // Default behavior: SELECT yields one synthetic row, anything else
        // an empty result.
        if sql.to_uppercase().starts_with("SELECT") {
            let columns = vec![ColumnInfo::new("result", "text")];
            let rows = vec![vec![Value::Text(format!("Mock result for: {sql}"))]];

            Ok(QueryResult {
                columns,
                rows,
                execution_time: Duration::from_millis(1),
                row_count: 1,
            })
        } else {
            Ok(QueryResult {
                columns: vec![],
                rows: vec![],
                execution_time: Duration::from_millis(1),
                row_count: 0,
            })
        }
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// A database client whose every operation fails.
pub struct FailingDatabaseClient;

#[async_trait]
impl DatabaseClient for FailingDatabaseClient {
    async fn introspect_tables(&self) -> Result<Vec<TableDescriptor>> {
        Err(AskdbError::schema("introspection failed (mock)"))
    }

    async fn execute_query(&self, _sql: &str) -> Result<QueryResult> {
        Err(AskdbError::query("execution failed (mock)"))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
