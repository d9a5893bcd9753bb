//! Database abstraction layer.
//!
//! Provides a trait-based interface for database operations, allowing
//! different database backends to be used interchangeably.

mod mock;
mod postgres;
mod schema;
mod sqlite;
mod types;

pub use mock::MockDatabaseClient;
pub use postgres::PostgresClient;
pub use schema::{Column, Schema, Table};
pub use sqlite::SqliteClient;
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::config::ConnectionConfig;
use crate::error::Result;
use async_trait::async_trait;

/// Maximum rows returned from a query; the rest is counted but dropped.
pub const MAX_ROWS: usize = 1000;

/// Query timeout in seconds.
pub const QUERY_TIMEOUT_SECS: u64 = 30;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Postgres,
    Sqlite,
}

impl DatabaseBackend {
    /// Returns the backend name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }

    /// Parses a backend from a string or URL scheme.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Returns the default port for this backend (0 for file-based backends).
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Postgres => 5432,
            Self::Sqlite => 0,
        }
    }
}

/// Creates a database client for the configured backend.
///
/// This is the central factory function for database connections.
pub async fn connect(config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>> {
    match config.backend {
        DatabaseBackend::Postgres => Ok(Box::new(PostgresClient::connect(config).await?)),
        DatabaseBackend::Sqlite => Ok(Box::new(SqliteClient::connect(config).await?)),
    }
}

/// Trait defining the interface for database clients.
///
/// All database operations are async and return Results with InsightError.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Returns the backend this client talks to.
    fn backend(&self) -> DatabaseBackend;

    /// Introspects the database schema, returning table information.
    async fn introspect_schema(&self) -> Result<Schema>;

    /// Executes a SQL query and returns the results.
    async fn execute_query(&self, sql: &str) -> Result<QueryResult>;

    /// Executes a SQL query in a session the database itself keeps read-only.
    ///
    /// Writes hidden from the classifier (e.g. inside function calls) fail
    /// with a query error instead of taking effect.
    async fn execute_read_only(&self, sql: &str) -> Result<QueryResult>;

    /// Closes the database connection.
    async fn close(&self) -> Result<()>;
}
