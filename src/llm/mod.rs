//! LLM integration for db-insight.
//!
//! Provides the client trait the agents talk to and its implementations for
//! hosted OpenAI-compatible services.

pub mod factory;
pub mod mock;
pub mod openai;
pub mod parser;
pub mod types;

pub use factory::create_client;
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, OpenAiConfig};
pub use parser::{parse_llm_response, ParsedResponse};
pub use types::{
    Capability, CodeOutput, CodeRun, CompletionRequest, LlmResponse, Message, Role,
};

use async_trait::async_trait;
use std::str::FromStr;

use crate::error::Result;

/// Trait for clients of a hosted agent service.
///
/// Implementations must be thread-safe (Send + Sync) so one client can be
/// shared by several agents.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Runs one agent invocation and returns the complete response.
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse>;
}

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProvider {
    /// Azure OpenAI / Azure AI Foundry deployment
    #[default]
    Azure,
    /// OpenAI (GPT-4o, etc.)
    OpenAi,
    /// Mock client for testing (no credential required)
    Mock,
}

impl LlmProvider {
    /// Returns the provider as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Azure => "azure",
            Self::OpenAi => "openai",
            Self::Mock => "mock",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "azure" | "azure-openai" => Ok(Self::Azure),
            "openai" => Ok(Self::OpenAi),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown LLM provider: {}", s)),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_str() {
        assert_eq!("azure".parse::<LlmProvider>().unwrap(), LlmProvider::Azure);
        assert_eq!(
            "OpenAI".parse::<LlmProvider>().unwrap(),
            LlmProvider::OpenAi
        );
        assert_eq!("mock".parse::<LlmProvider>().unwrap(), LlmProvider::Mock);
        assert!("anthropic".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn test_provider_display() {
        assert_eq!(format!("{}", LlmProvider::OpenAi), "openai");
        assert_eq!(LlmProvider::default(), LlmProvider::Azure);
    }

    #[tokio::test]
    async fn test_mock_client_implements_trait() {
        let client: Box<dyn LlmClient> = Box::new(MockLlmClient::new());
        let request = CompletionRequest {
            agent: "sql_query_generator_agent".to_string(),
            instructions: "Write a SQL query".to_string(),
            messages: vec![Message::user("Which project has the most issues?")],
            capabilities: vec![],
        };
        let response = client.complete(&request).await.unwrap();
        assert!(response.content.contains("SELECT"));
    }
}
