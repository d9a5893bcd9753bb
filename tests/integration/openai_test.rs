//! Responses API client tests against a local mock server.

use std::sync::Arc;
use std::time::Duration;

use db_insight::agent::{AgentConfig, AnalysisAgent, QueryPlanner, Question};
use db_insight::credential::{AccessToken, Credential};
use db_insight::llm::{
    Capability, CodeOutput, CompletionRequest, LlmClient, Message, OpenAiClient, OpenAiConfig,
};
use mockito::Matcher;
use serde_json::json;

fn api_key(key: &str) -> Arc<Credential> {
    Arc::new(Credential::ApiKey(key.to_string()))
}

fn planner_reply() -> String {
    json!({
        "id": "resp_123",
        "object": "response",
        "status": "completed",
        "output": [{
            "type": "message",
            "id": "msg_1",
            "role": "assistant",
            "content": [{
                "type": "output_text",
                "text": "```sql\nSELECT project, COUNT(*) FROM issues GROUP BY project;\n```",
                "annotations": []
            }]
        }]
    })
    .to_string()
}

fn analyst_reply() -> String {
    json!({
        "id": "resp_456",
        "status": "completed",
        "output": [
            {
                "type": "code_interpreter_call",
                "id": "ci_1",
                "status": "completed",
                "container_id": "cntr_1",
                "code": "import pandas as pd\nprint(len(df))",
                "outputs": [{"type": "logs", "logs": "2\n"}]
            },
            {
                "type": "message",
                "role": "assistant",
                "content": [{"type": "output_text", "text": "Apollo has the most issues."}]
            }
        ]
    })
    .to_string()
}

fn fast_retries(config: OpenAiConfig) -> OpenAiConfig {
    config.with_retry_delay(Duration::from_millis(1))
}

#[tokio::test]
async fn test_planner_over_openai_wire_format() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/responses")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o",
            "input": [{"role": "user", "content": "Which project has the most issues?"}]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(planner_reply())
        .create_async()
        .await;

    let config = OpenAiConfig::new("gpt-4o").with_base_url(format!("{}/v1", server.url()));
    let client = Arc::new(OpenAiClient::new(config, api_key("sk-test")).unwrap());

    let question = Question::new("Which project has the most issues?").unwrap();
    let planner =
        QueryPlanner::new(&AgentConfig::for_planner("issues(project text)", question), client)
            .unwrap();
    let planned = planner.plan().await.unwrap();

    assert_eq!(
        planned.sql,
        "SELECT project, COUNT(*) FROM issues GROUP BY project;"
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_analyst_sends_code_interpreter_tool() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/responses")
        .match_body(Matcher::PartialJson(json!({
            "tools": [{"type": "code_interpreter", "container": {"type": "auto"}}],
            "include": ["code_interpreter_call.outputs"]
        })))
        .with_status(200)
        .with_body(analyst_reply())
        .create_async()
        .await;

    let config = OpenAiConfig::new("gpt-4o").with_base_url(format!("{}/v1", server.url()));
    let client = Arc::new(OpenAiClient::new(config, api_key("sk-test")).unwrap());

    let question = Question::new("Which project has the most issues?").unwrap();
    let analyst = AnalysisAgent::new(&AgentConfig::for_analyst(question), client).unwrap();
    let run = analyst.analyze(None).await.unwrap();

    assert_eq!(run.text, "Apollo has the most issues.");
    assert_eq!(run.code_runs.len(), 1);
    assert_eq!(
        run.code_runs[0].outputs,
        vec![CodeOutput::Logs {
            text: "2\n".to_string()
        }]
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_azure_api_key_header_and_path() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/openai/v1/responses")
        .match_header("api-key", "azure-key")
        .match_header("authorization", Matcher::Missing)
        .match_body(Matcher::PartialJson(json!({"model": "my-deployment"})))
        .with_status(200)
        .with_body(planner_reply())
        .create_async()
        .await;

    let config = OpenAiConfig::azure(&server.url(), "my-deployment");
    let client = OpenAiClient::new(config, api_key("azure-key")).unwrap();

    let request = CompletionRequest {
        agent: "sql_query_generator_agent".to_string(),
        instructions: "Write SQL".to_string(),
        messages: vec![Message::user("Which project has the most issues?")],
        capabilities: vec![],
    };
    let response = client.complete(&request).await.unwrap();

    assert!(response.content.contains("SELECT project"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_azure_cli_token_is_bearer() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/openai/v1/responses")
        .match_header("authorization", "Bearer token-from-az")
        .match_header("api-key", Matcher::Missing)
        .with_status(200)
        .with_body(analyst_reply())
        .create_async()
        .await;

    let config = OpenAiConfig::azure(&server.url(), "my-deployment");
    let credential = Arc::new(Credential::AccessToken(AccessToken::new(
        "token-from-az",
        None,
    )));
    let client = OpenAiClient::new(config, credential).unwrap();

    let request = CompletionRequest {
        agent: "code_interpreter_agent".to_string(),
        instructions: "Analyze".to_string(),
        messages: vec![Message::user("Analyze this dataset and create a visualization")],
        capabilities: vec![Capability::CodeInterpreter],
    };
    let response = client.complete(&request).await.unwrap();

    assert_eq!(response.code_runs.len(), 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/responses")
        .with_status(401)
        .with_body(r#"{"error":{"message":"Incorrect API key provided"}}"#)
        .expect(1)
        .create_async()
        .await;

    let config =
        fast_retries(OpenAiConfig::new("gpt-4o").with_base_url(format!("{}/v1", server.url())));
    let client = OpenAiClient::new(config, api_key("sk-wrong")).unwrap();

    let request = CompletionRequest {
        agent: "sql_query_generator_agent".to_string(),
        instructions: String::new(),
        messages: vec![Message::user("q")],
        capabilities: vec![],
    };
    let err = client.complete(&request).await.unwrap_err();

    assert_eq!(err.category(), "LLM Error");
    assert!(err.to_string().contains("Authentication failed"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_errors_are_retried_three_times() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/responses")
        .with_status(503)
        .with_body(r#"{"error":{"message":"The service is temporarily overloaded"}}"#)
        .expect(3)
        .create_async()
        .await;

    let config =
        fast_retries(OpenAiConfig::new("gpt-4o").with_base_url(format!("{}/v1", server.url())));
    let client = OpenAiClient::new(config, api_key("sk-test")).unwrap();

    let request = CompletionRequest {
        agent: "sql_query_generator_agent".to_string(),
        instructions: String::new(),
        messages: vec![Message::user("q")],
        capabilities: vec![],
    };
    let err = client.complete(&request).await.unwrap_err();

    assert!(err.to_string().contains("temporarily overloaded"));
    mock.assert_async().await;
}
