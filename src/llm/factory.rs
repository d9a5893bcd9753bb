//! LLM client factory.
//!
//! Centralizes provider-specific logic for creating LLM clients.

use std::sync::Arc;

use crate::config::LlmConfig;
use crate::credential::Credential;
use crate::error::{InsightError, Result};
use crate::llm::{LlmClient, LlmProvider, MockLlmClient, OpenAiClient, OpenAiConfig};

/// Default model for api.openai.com.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

/// Creates an LLM client from configuration and a shared credential.
///
/// Missing settings are resolved from the environment:
/// - `AZURE_OPENAI_ENDPOINT` and `AZURE_OPENAI_DEPLOYMENT` for Azure
/// - `OPENAI_MODEL` for OpenAI (defaults to "gpt-4o")
pub fn create_client(
    config: &LlmConfig,
    credential: Arc<Credential>,
) -> Result<Arc<dyn LlmClient>> {
    create_client_with(config, credential, |key| std::env::var(key).ok())
}

fn create_client_with(
    config: &LlmConfig,
    credential: Arc<Credential>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Arc<dyn LlmClient>> {
    let provider: LlmProvider = config.provider.parse().map_err(InsightError::config)?;

    let client_config = match provider {
        LlmProvider::Mock => return Ok(Arc::new(MockLlmClient::new())),
        LlmProvider::Azure => {
            let endpoint = config
                .endpoint
                .clone()
                .or_else(|| lookup("AZURE_OPENAI_ENDPOINT"))
                .ok_or_else(|| {
                    InsightError::config(
                        "No Azure endpoint configured. Set [llm] endpoint or AZURE_OPENAI_ENDPOINT.",
                    )
                })?;
            let deployment = config
                .model
                .clone()
                .or_else(|| lookup("AZURE_OPENAI_DEPLOYMENT"))
                .ok_or_else(|| {
                    InsightError::config(
                        "No Azure deployment configured. Use --model or set AZURE_OPENAI_DEPLOYMENT.",
                    )
                })?;
            OpenAiConfig::azure(&endpoint, deployment)
        }
        LlmProvider::OpenAi => {
            let model = config
                .model
                .clone()
                .or_else(|| lookup("OPENAI_MODEL"))
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
            let openai = OpenAiConfig::new(model);
            match &config.endpoint {
                Some(endpoint) => openai.with_base_url(endpoint.as_str()),
                None => openai,
            }
        }
    };

    let client = OpenAiClient::new(client_config.with_timeout(config.timeout_secs), credential)?;
    Ok(Arc::new(client))
}
