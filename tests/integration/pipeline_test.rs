//! End-to-end pipeline tests.
//!
//! Runs both agents against the mock LLM and an in-memory SQLite database.

use std::sync::Arc;

use db_insight::agent::{planner_instructions, Question};
use db_insight::config::ConnectionConfig;
use db_insight::db::{DatabaseClient, SqliteClient, Value};
use db_insight::llm::MockLlmClient;
use db_insight::pipeline::{Pipeline, PipelineOptions};
use pretty_assertions::assert_eq;

const ISSUES_SCHEMA: &str = "issues(id INTEGER PK, project TEXT NOT NULL, root_cause TEXT)";

/// Opens an in-memory database with a small issue tracker table.
async fn seeded_sqlite() -> SqliteClient {
    let config = ConnectionConfig::from_connection_string("sqlite::memory:").unwrap();
    let client = SqliteClient::connect(&config).await.unwrap();

    for sql in [
        "CREATE TABLE issues (id INTEGER PRIMARY KEY, project TEXT NOT NULL, root_cause TEXT)",
        "INSERT INTO issues (project, root_cause) VALUES ('Apollo', 'config'), ('Apollo', 'network'), ('Apollo', 'config'), ('Gemini', 'disk')",
    ] {
        client.execute_query(sql).await.unwrap();
    }

    client
}

fn question(text: &str) -> Question {
    Question::new(text).unwrap()
}

#[tokio::test]
async fn test_query_result_feeds_analysis_prompt() {
    let llm = Arc::new(MockLlmClient::new());
    let db = Arc::new(seeded_sqlite().await);
    let pipeline = Pipeline::new(llm.clone(), Some(db), PipelineOptions::default());
    let q = question("Which project has the most issues?");

    let report = pipeline.run(&q).await.unwrap();

    assert_eq!(report.schema, ISSUES_SCHEMA);
    let result = report.result.as_ref().unwrap();
    assert_eq!(result.row_count, 2);
    assert_eq!(result.rows[0][0], Value::String("Apollo".to_string()));
    assert_eq!(result.rows[0][1], Value::Int(3));

    let requests = llm.requests();
    assert_eq!(requests.len(), 2);

    assert_eq!(requests[0].agent, "sql_query_generator_agent");
    assert_eq!(requests[0].instructions, planner_instructions(ISSUES_SCHEMA, &q));
    assert_eq!(requests[0].last_user_message(), Some(q.as_str()));

    assert_eq!(requests[1].agent, "code_interpreter_agent");
    let prompt = requests[1].last_user_message().unwrap();
    assert!(prompt.starts_with("Analyze this dataset and create a visualization\n\n"));
    assert!(prompt.contains(&report.sql));
    assert!(prompt.ends_with("```csv\nproject,issue_count\nApollo,3\nGemini,1\n```"));

    let analysis = report.analysis.as_ref().unwrap();
    assert!(analysis.text.contains("Analyzed 2 rows"));

    let printed = report.to_string();
    assert!(printed.contains("Safety: Safe (SELECT)"));
    assert!(printed.contains("Analysis:"));
}

#[tokio::test]
async fn test_planner_instruction_with_empty_schema() {
    let llm = Arc::new(MockLlmClient::new());
    let pipeline = Pipeline::new(llm.clone(), None, PipelineOptions::default());

    pipeline
        .run(&question("Which project has the most issues?"))
        .await
        .unwrap();

    assert_eq!(
        llm.requests()[0].instructions,
        "You are a helpful agent meant to write SQL queries to query the data necessary for the provided schema: . The user has the following question: Which project has the most issues?. Write a SQL query to answer the user's question based on the provided schema."
    );
}

#[tokio::test]
async fn test_destructive_sql_is_not_executed() {
    let llm = Arc::new(
        MockLlmClient::new().with_response("start over", "```sql\nDROP TABLE issues;\n```"),
    );
    let db = Arc::new(seeded_sqlite().await);
    let pipeline = Pipeline::new(llm, Some(db.clone()), PipelineOptions::default());

    let err = pipeline
        .run(&question("Let's start over with the issue data"))
        .await
        .unwrap_err();

    assert_eq!(err.category(), "Query Error");
    let still_there = db.execute_query("SELECT COUNT(*) FROM issues").await.unwrap();
    assert_eq!(still_there.rows[0][0], Value::Int(4));
}

#[tokio::test]
async fn test_each_question_gets_its_own_agents() {
    let llm = Arc::new(MockLlmClient::new());
    let db = Arc::new(seeded_sqlite().await);
    let pipeline = Pipeline::new(llm.clone(), Some(db), PipelineOptions::default());

    let first = question("Which project has the most issues?");
    let second = question("Are there any patterns we should focus on correcting?");
    pipeline.run(&first).await.unwrap();
    pipeline.run(&second).await.unwrap();

    let requests = llm.requests();
    assert_eq!(requests.len(), 4);
    assert!(requests[2].instructions.contains(second.as_str()));
    assert!(requests[3].instructions.ends_with(second.as_str()));
    // Schema is resolved once and reused
    assert!(requests[2].instructions.contains(ISSUES_SCHEMA));
}

#[tokio::test]
async fn test_query_error_propagates() {
    let llm = Arc::new(
        MockLlmClient::new().with_response("tickets", "```sql\nSELECT * FROM tickets;\n```"),
    );
    let db = Arc::new(seeded_sqlite().await);
    let pipeline = Pipeline::new(llm.clone(), Some(db), PipelineOptions::default());

    let err = pipeline
        .run(&question("How many tickets are open?"))
        .await
        .unwrap_err();

    assert_eq!(err.category(), "Query Error");
    assert!(err.to_string().contains("tickets"));
    // The analysis agent never ran
    assert_eq!(llm.requests().len(), 1);
}

#[tokio::test]
async fn test_analyze_only_returns_printable_result() {
    let llm = Arc::new(MockLlmClient::new());
    let pipeline = Pipeline::new(llm.clone(), None, PipelineOptions::default());

    let run = pipeline
        .analyze_only(&question("What are the most common problems with respective resolutions?"))
        .await
        .unwrap();

    let printed = run.to_string();
    assert!(!printed.is_empty());
    assert!(printed.contains("[code run 1]"));

    let requests = llm.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].last_user_message(),
        Some("Analyze this dataset and create a visualization")
    );
}
