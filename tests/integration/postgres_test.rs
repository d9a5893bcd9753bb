//! PostgreSQL integration tests.
//!
//! These tests require a running PostgreSQL database.
//! Set DATABASE_URL environment variable to run them.

use std::sync::Arc;

use db_insight::agent::Question;
use db_insight::config::ConnectionConfig;
use db_insight::db::{DatabaseBackend, DatabaseClient, PostgresClient, Value};
use db_insight::llm::MockLlmClient;
use db_insight::pipeline::{Pipeline, PipelineOptions};

/// Helper to get test database URL from environment.
fn get_test_database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

/// Helper to create a test client.
async fn get_test_client() -> Option<PostgresClient> {
    let url = get_test_database_url()?;
    let config = ConnectionConfig::from_connection_string(&url).ok()?;
    if config.backend != DatabaseBackend::Postgres {
        return None;
    }
    PostgresClient::connect(&config).await.ok()
}

#[tokio::test]
async fn test_connect_with_valid_credentials() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    client.close().await.unwrap();
}

#[tokio::test(flavor = "current_thread")]
async fn test_connect_with_invalid_port() {
    let config = ConnectionConfig {
        host: Some("localhost".to_string()),
        port: 59999, // Unlikely to be in use
        database: Some("testdb".to_string()),
        user: Some("testuser".to_string()),
        password: Some("testpass".to_string()),
        ..Default::default()
    };

    let err = PostgresClient::connect(&config).await.unwrap_err();
    assert_eq!(err.category(), "Connection Error");
}

#[tokio::test]
async fn test_execute_simple_select() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = client
        .execute_query("SELECT 1::int8 AS num, 'hello' AS greeting, NULL::text AS nothing")
        .await
        .unwrap();

    assert_eq!(result.columns.len(), 3);
    assert_eq!(result.columns[0].name, "num");
    assert_eq!(result.rows[0][0], Value::Int(1));
    assert_eq!(result.rows[0][1], Value::String("hello".to_string()));
    assert_eq!(result.rows[0][2], Value::Null);
    assert_eq!(result.to_csv(10), "num,greeting,nothing\n1,hello,\n");

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_syntax_error_is_query_error() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let err = client.execute_query("SELEC 1").await.unwrap_err();
    assert_eq!(err.category(), "Query Error");

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_read_only_execution_blocks_writing_functions() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    client
        .execute_query("CREATE SEQUENCE IF NOT EXISTS insight_read_only_seq")
        .await
        .unwrap();

    // nextval() writes although the statement is a plain SELECT
    let err = client
        .execute_read_only("SELECT nextval('insight_read_only_seq')")
        .await
        .unwrap_err();
    assert_eq!(err.category(), "Query Error");
    assert!(err.to_string().contains("read-only transaction"));

    let ok = client.execute_read_only("SELECT 1::int8 AS one").await.unwrap();
    assert_eq!(ok.rows[0][0], Value::Int(1));

    client
        .execute_query("DROP SEQUENCE insight_read_only_seq")
        .await
        .unwrap();
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_introspect_schema() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    // Whatever the database holds, formatting must agree with the table list
    let schema = client.introspect_schema().await.unwrap();
    let formatted = schema.format_for_llm();
    for table in &schema.tables {
        assert!(formatted.contains(&format!("{}(", table.name)));
    }

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_pipeline_against_postgres() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let llm = Arc::new(MockLlmClient::new().with_response(
        "database version",
        "```sql\nSELECT version() AS version;\n```",
    ));
    let db = Arc::new(client);
    let pipeline = Pipeline::new(llm, Some(db.clone()), PipelineOptions::default());

    let question = Question::new("What database version is running?").unwrap();
    let report = pipeline.run(&question).await.unwrap();

    let result = report.result.as_ref().unwrap();
    assert_eq!(result.row_count, 1);
    assert!(report.analysis.is_some());

    db.close().await.unwrap();
}
