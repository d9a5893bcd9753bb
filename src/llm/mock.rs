//! Mock LLM client for testing.
//!
//! Provides deterministic responses based on input patterns.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::Result;
use crate::llm::types::{Capability, CodeOutput, CodeRun, CompletionRequest, LlmResponse};
use crate::llm::LlmClient;

/// SQL returned for planner requests about issues and projects.
pub const MOCK_ISSUE_SQL: &str =
    "SELECT project, COUNT(*) AS issue_count FROM issues GROUP BY project ORDER BY issue_count DESC";

/// Mock LLM client that returns canned responses based on input patterns.
///
/// Requests carrying the code-interpreter capability get an analysis reply
/// with one synthetic code run; all other requests are treated as planning.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    /// Custom response mappings (pattern -> response).
    custom_responses: Vec<(String, String)>,
    /// Every request received, in order.
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlmClient {
    /// Creates a new mock client with default responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom response mapping.
    ///
    /// When the prompt contains `pattern`, the mock will return `response`.
    pub fn with_response(
        mut self,
        pattern: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.custom_responses
            .push((pattern.into(), response.into()));
        self
    }

    /// Returns the requests received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn custom_response(&self, input_lower: &str) -> Option<String> {
        self.custom_responses
            .iter()
            .find(|(pattern, _)| input_lower.contains(&pattern.to_lowercase()))
            .map(|(_, response)| response.clone())
    }

    /// Generates a planner reply.
    fn plan_response(input_lower: &str) -> String {
        let mentions_issues = ["issue", "problem", "project", "pattern", "root cause"]
            .iter()
            .any(|word| input_lower.contains(word));

        if mentions_issues {
            return format!(
                "Counting issues per project answers this.\n\n```sql\n{};\n```",
                MOCK_ISSUE_SQL
            );
        }

        "I don't understand that question. Could you please rephrase it?".to_string()
    }

    /// Generates an analysis reply with one code run over the supplied data.
    fn analysis_response(input: &str) -> LlmResponse {
        // Rows of the fenced CSV block, minus the header line
        let data_rows = input
            .split("```csv")
            .nth(1)
            .and_then(|rest| rest.split("```").next())
            .map(|csv| {
                csv.lines()
                    .filter(|line| !line.starts_with('#') && !line.trim().is_empty())
                    .count()
                    .saturating_sub(1)
            })
            .unwrap_or(0);

        let summary = if data_rows == 0 {
            "No dataset was provided, so there is nothing to visualize yet.".to_string()
        } else {
            format!("Analyzed {data_rows} rows and plotted them as a bar chart.")
        };

        LlmResponse::text(summary).with_code_run(CodeRun {
            code: "import pandas as pd\nimport io\ndf = pd.read_csv(io.StringIO(data))\ndf.plot.bar()".to_string(),
            outputs: vec![
                CodeOutput::Logs {
                    text: format!("rows: {data_rows}"),
                },
                CodeOutput::Image {
                    url: "mock://chart.png".to_string(),
                },
            ],
        })
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let input = request.last_user_message().unwrap_or_default();
        let input_lower = input.to_lowercase();

        if let Some(response) = self.custom_response(&input_lower) {
            return Ok(LlmResponse::text(response));
        }

        if request.has_capability(Capability::CodeInterpreter) {
            return Ok(Self::analysis_response(input));
        }

        Ok(LlmResponse::text(Self::plan_response(&input_lower)))
    }
}
