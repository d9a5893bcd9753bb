//! Mock database client for testing.
//!
//! Answers every query with a canned result.

use super::{ColumnInfo, DatabaseBackend, DatabaseClient, QueryResult, Schema, Value};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// A mock database client that returns predefined results.
#[derive(Debug)]
pub struct MockDatabaseClient {
    schema: Schema,
    result: QueryResult,
    executed: Mutex<Vec<(String, bool)>>,
}

impl MockDatabaseClient {
    /// Creates a mock client with an empty schema and a small issue table.
    pub fn new() -> Self {
        let result = QueryResult::with_data(
            vec![
                ColumnInfo::new("project", "text"),
                ColumnInfo::new("issue_count", "int8"),
            ],
            vec![
                vec![Value::from("Apollo"), Value::Int(42)],
                vec![Value::from("Gemini"), Value::Int(17)],
            ],
        )
        .with_execution_time(Duration::from_millis(1));

        Self {
            schema: Schema::default(),
            result,
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Sets the schema returned by introspection.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Sets the result returned for every query.
    pub fn with_result(mut self, result: QueryResult) -> Self {
        self.result = result;
        self
    }

    /// Returns the SQL statements executed so far.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|sqls| sqls.iter().map(|(sql, _)| sql.clone()).collect())
            .unwrap_or_default()
    }

    /// Returns the SQL statements executed through the read-only path.
    pub fn executed_read_only(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|sqls| {
                sqls.iter()
                    .filter(|(_, read_only)| *read_only)
                    .map(|(sql, _)| sql.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn record(&self, sql: &str, read_only: bool) {
        if let Ok(mut executed) = self.executed.lock() {
            executed.push((sql.to_string(), read_only));
        }
    }
}

impl Default for MockDatabaseClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Postgres
    }

    async fn introspect_schema(&self) -> Result<Schema> {
        Ok(self.schema.clone())
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        self.record(sql, false);
        Ok(self.result.clone())
    }

    async fn execute_read_only(&self, sql: &str) -> Result<QueryResult> {
        self.record(sql, true);
        Ok(self.result.clone())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
