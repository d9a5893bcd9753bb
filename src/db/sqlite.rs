//! SQLite database client implementation.
//!
//! Useful for local datasets and for exercising the full pipeline without a
//! database server.

use crate::config::ConnectionConfig;
use crate::db::{
    Column, ColumnInfo, DatabaseBackend, DatabaseClient, QueryResult, Row, Schema, Table, Value,
    MAX_ROWS, QUERY_TIMEOUT_SECS,
};
use crate::error::{InsightError, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as SqlxColumn, Row as SqlxRow, TypeInfo, ValueRef};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// SQLite database client.
#[derive(Debug)]
pub struct SqliteClient {
    pool: SqlitePool,
}

impl SqliteClient {
    /// Opens the database file (or in-memory database) named by the config.
    ///
    /// The pool holds a single connection so that `sqlite::memory:` keeps one
    /// database for the client's lifetime.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let conn_str = config.to_connection_string()?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&conn_str)
            .await
            .map_err(|e| {
                InsightError::connection(format!(
                    "Cannot open SQLite database {}: {e}",
                    config.display_string()
                ))
            })?;

        debug!(database = %config.display_string(), "Opened SQLite database");
        Ok(Self { pool })
    }

    async fn fetch_columns(&self, table_name: &str) -> Result<(Vec<Column>, Vec<String>)> {
        // (cid, name, type, notnull, dflt_value, pk)
        let rows: Vec<(i64, String, String, i64, Option<String>, i64)> =
            sqlx::query_as("SELECT cid, name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1)")
                .bind(table_name)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    InsightError::query(format!("Failed to fetch columns for {table_name}: {e}"))
                })?;

        let mut primary_key: Vec<(i64, String)> = Vec::new();
        let columns = rows
            .into_iter()
            .map(|(_, name, data_type, not_null, _, pk)| {
                if pk > 0 {
                    primary_key.push((pk, name.clone()));
                }
                Column::new(name, data_type).nullable(not_null == 0)
            })
            .collect();

        primary_key.sort();
        Ok((columns, primary_key.into_iter().map(|(_, name)| name).collect()))
    }
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Sqlite
    }

    async fn introspect_schema(&self) -> Result<Schema> {
        let table_names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| InsightError::query(format!("Failed to fetch tables: {e}")))?;

        let mut tables = Vec::with_capacity(table_names.len());
        for name in table_names {
            let (columns, primary_key) = self.fetch_columns(&name).await?;
            tables.push(Table {
                name,
                columns,
                primary_key,
            });
        }

        Ok(Schema { tables })
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        let start = Instant::now();
        let rows = fetch_with_timeout(sqlx::query(sql).fetch_all(&self.pool)).await?;
        Ok(into_query_result(rows, start.elapsed()))
    }

    async fn execute_read_only(&self, sql: &str) -> Result<QueryResult> {
        let start = Instant::now();

        // The pool holds one connection, so the pragma applies to the query below
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| InsightError::query(e.to_string()))?;
        set_query_only(&mut conn, true).await?;
        let fetched = fetch_with_timeout(sqlx::query(sql).fetch_all(&mut *conn)).await;
        set_query_only(&mut conn, false).await?;

        Ok(into_query_result(fetched?, start.elapsed()))
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

async fn set_query_only(conn: &mut SqliteConnection, on: bool) -> Result<()> {
    let pragma = if on {
        "PRAGMA query_only = ON"
    } else {
        "PRAGMA query_only = OFF"
    };
    sqlx::query(pragma)
        .execute(&mut *conn)
        .await
        .map_err(|e| InsightError::query(format!("Failed to set query_only: {e}")))?;
    Ok(())
}

/// Awaits a fetch, bounded by the query timeout.
async fn fetch_with_timeout(
    fetch: impl Future<Output = std::result::Result<Vec<SqliteRow>, sqlx::Error>>,
) -> Result<Vec<SqliteRow>> {
    tokio::time::timeout(Duration::from_secs(QUERY_TIMEOUT_SECS), fetch)
        .await
        .map_err(|_| {
            InsightError::query(format!(
                "Query timed out after {QUERY_TIMEOUT_SECS} seconds"
            ))
        })?
        .map_err(|e| InsightError::query(e.to_string()))
}

fn into_query_result(result: Vec<SqliteRow>, execution_time: Duration) -> QueryResult {
    let columns: Vec<ColumnInfo> = result
        .first()
        .map(|row| {
            row.columns()
                .iter()
                .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                .collect()
        })
        .unwrap_or_default();

    let total_rows = result.len();
    let was_truncated = total_rows > MAX_ROWS;
    if was_truncated {
        warn!(
            "Query returned {} rows, truncating to {} rows",
            total_rows, MAX_ROWS
        );
    }

    let rows: Vec<Row> = result.iter().take(MAX_ROWS).map(convert_row).collect();
    let row_count = rows.len();

    QueryResult {
        columns,
        rows,
        execution_time,
        row_count,
        total_rows: Some(total_rows),
        was_truncated,
    }
}

fn convert_row(row: &SqliteRow) -> Row {
    (0..row.columns().len())
        .map(|i| convert_value(row, i))
        .collect()
}

/// Decodes a value by its runtime storage class; SQLite columns are not typed.
fn convert_value(row: &SqliteRow, index: usize) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Err(_) => return Value::Null,
        Ok(_) => {}
    }

    if let Ok(v) = row.try_get::<i64, _>(index) {
        return Value::Int(v);
    }
    if let Ok(v) = row.try_get::<f64, _>(index) {
        return Value::Float(v);
    }
    if let Ok(v) = row.try_get::<String, _>(index) {
        return Value::String(v);
    }
    row.try_get::<Vec<u8>, _>(index)
        .map(Value::Bytes)
        .unwrap_or(Value::Null)
}
