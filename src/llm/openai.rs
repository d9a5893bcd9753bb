//! OpenAI Responses API client.
//!
//! Implements the LlmClient trait for OpenAI and Azure OpenAI. Both expose the
//! same `/responses` endpoint, which runs hosted tools such as the code
//! interpreter server-side and reports each tool call in the response.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::credential::{AuthScheme, Credential};
use crate::error::{InsightError, Result};
use crate::llm::types::{Capability, CodeOutput, CodeRun, CompletionRequest, LlmResponse};
use crate::llm::LlmClient;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// OpenAI API base URL.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Maximum number of retry attempts for transient errors.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API base URL, without the `/responses` suffix.
    pub base_url: String,
    /// Model to use, or the deployment name on Azure.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// How the credential is sent.
    pub auth: AuthScheme,
    /// Backoff before the first retry.
    pub retry_base_delay: Duration,
}

impl OpenAiConfig {
    /// Creates a config for api.openai.com with the given model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            base_url: OPENAI_API_BASE.to_string(),
            model: model.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            auth: AuthScheme::Bearer,
            retry_base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
        }
    }

    /// Creates a config for an Azure OpenAI resource and deployment.
    ///
    /// `endpoint` is the resource URL, e.g. `https://my-resource.openai.azure.com`.
    pub fn azure(endpoint: &str, deployment: impl Into<String>) -> Self {
        Self {
            base_url: format!("{}/openai/v1", endpoint.trim_end_matches('/')),
            auth: AuthScheme::Azure,
            ..Self::new(deployment)
        }
    }

    /// Overrides the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Sets the delay before the first retry.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    fn responses_url(&self) -> String {
        format!("{}/responses", self.base_url)
    }
}

/// Client for the OpenAI Responses API.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    credential: Arc<Credential>,
    client: Client,
}

impl OpenAiClient {
    /// Creates a new client with the given configuration and credential.
    pub fn new(config: OpenAiConfig, credential: Arc<Credential>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| InsightError::llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            credential,
            client,
        })
    }

    /// Converts a completion request to the wire format.
    fn build_request<'a>(&'a self, request: &'a CompletionRequest) -> ResponsesRequest<'a> {
        let tools: Vec<Tool> = request
            .capabilities
            .iter()
            .map(|capability| match capability {
                Capability::CodeInterpreter => Tool::CodeInterpreter {
                    container: Container { kind: "auto" },
                },
            })
            .collect();

        let include = if request.has_capability(Capability::CodeInterpreter) {
            vec!["code_interpreter_call.outputs"]
        } else {
            Vec::new()
        };

        ResponsesRequest {
            model: &self.config.model,
            instructions: &request.instructions,
            input: request
                .messages
                .iter()
                .map(|m| InputMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            tools,
            include,
        }
    }

    /// Parses an API error response and returns (error, is_retryable).
    fn parse_error(status: reqwest::StatusCode, body: &str) -> (InsightError, bool) {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return (
                InsightError::llm(
                    "Authentication failed. Check the API key or run `az login` again.",
                ),
                false,
            );
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return (
                InsightError::llm("Rate limited. Please wait and try again."),
                true,
            );
        }

        // 5xx errors are generally retryable
        let is_retryable = status.is_server_error();

        if let Ok(error_response) = serde_json::from_str::<ApiErrorResponse>(body) {
            return (
                InsightError::llm(format!("API error: {}", error_response.error.message)),
                is_retryable,
            );
        }

        (
            InsightError::llm(format!("API error ({}): {}", status, body)),
            is_retryable,
        )
    }

    /// Determines if a request error is retryable.
    fn is_retryable_request_error(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect()
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse> {
        let body = self.build_request(request);
        let url = self.config.responses_url();

        let mut last_error = None;
        let mut delay = self.config.retry_base_delay;

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            debug!(
                agent = %request.agent,
                model = %self.config.model,
                "Responses API request attempt {} of {}",
                attempt,
                MAX_RETRY_ATTEMPTS
            );

            let builder = self.client.post(&url).json(&body);
            let result = self
                .credential
                .authorize(builder, self.config.auth)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    let text = response
                        .text()
                        .await
                        .map_err(|e| InsightError::llm(format!("Failed to read response: {}", e)))?;

                    if status.is_success() {
                        return parse_response(&text);
                    }

                    let (error, is_retryable) = Self::parse_error(status, &text);
                    last_error = Some(error);

                    if !is_retryable || attempt >= MAX_RETRY_ATTEMPTS {
                        break;
                    }

                    warn!(
                        "Responses API request failed (attempt {}), retrying in {:?}: {}",
                        attempt, delay, status
                    );
                }
                Err(e) => {
                    let is_retryable = Self::is_retryable_request_error(&e);
                    let error = if e.is_timeout() {
                        InsightError::llm("Request timed out. Try again.")
                    } else if e.is_connect() {
                        InsightError::llm(format!(
                            "Failed to connect to {}. Check the endpoint and your network.",
                            self.config.base_url
                        ))
                    } else {
                        InsightError::llm(format!("Request failed: {}", e))
                    };
                    last_error = Some(error);

                    if !is_retryable || attempt >= MAX_RETRY_ATTEMPTS {
                        break;
                    }

                    warn!(
                        "Responses API request failed (attempt {}), retrying in {:?}",
                        attempt, delay
                    );
                }
            }

            tokio::time::sleep(delay).await;
            delay *= 2;
        }

        Err(last_error.unwrap_or_else(|| InsightError::internal("No request attempt was made")))
    }
}

/// Converts a successful response body into an LlmResponse.
fn parse_response(body: &str) -> Result<LlmResponse> {
    let response: ResponsesResponse = serde_json::from_str(body)
        .map_err(|e| InsightError::llm(format!("Failed to parse response: {}", e)))?;

    if let Some(error) = response.error {
        return Err(InsightError::llm(format!("API error: {}", error.message)));
    }

    let mut texts = Vec::new();
    let mut code_runs = Vec::new();

    for item in response.output {
        match item {
            OutputItem::Message { content } => {
                let text: String = content
                    .into_iter()
                    .filter_map(|part| match part {
                        ContentPart::OutputText { text } => Some(text),
                        ContentPart::Other => None,
                    })
                    .collect();
                if !text.is_empty() {
                    texts.push(text);
                }
            }
            OutputItem::CodeInterpreterCall { code, outputs } => {
                code_runs.push(CodeRun {
                    code: code.unwrap_or_default(),
                    outputs: outputs
                        .unwrap_or_default()
                        .into_iter()
                        .filter_map(|output| match output {
                            InterpreterOutput::Logs { logs } => Some(CodeOutput::Logs { text: logs }),
                            InterpreterOutput::Image { url } => Some(CodeOutput::Image { url }),
                            InterpreterOutput::Other => None,
                        })
                        .collect(),
                });
            }
            OutputItem::Other => {}
        }
    }

    if texts.is_empty() && code_runs.is_empty() {
        return Err(InsightError::llm("Empty response from the model"));
    }

    Ok(LlmResponse {
        content: texts.join("\n\n"),
        code_runs,
    })
}

// Responses API types

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    instructions: &'a str,
    input: Vec<InputMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    include: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct InputMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Tool {
    CodeInterpreter { container: Container },
}

#[derive(Debug, Serialize)]
struct Container {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ResponsesResponse {
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutputItem {
    Message {
        #[serde(default)]
        content: Vec<ContentPart>,
    },
    CodeInterpreterCall {
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        outputs: Option<Vec<InterpreterOutput>>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    OutputText { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InterpreterOutput {
    Logs { logs: String },
    Image { url: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}
