//! Credential acquisition for the hosted LLM service.
//!
//! A credential is acquired once per run and shared read-only between agents.
//! It is either an API key from the environment or an access token issued to
//! the identity the Azure CLI is logged in as.

use std::fmt;

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::CredentialSource;
use crate::error::{InsightError, Result};
use crate::llm::LlmProvider;

/// Token audience for Azure OpenAI / Azure AI services.
pub const COGNITIVE_SERVICES_RESOURCE: &str = "https://cognitiveservices.azure.com";

/// How a credential is attached to an HTTP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <secret>` for keys and tokens alike.
    Bearer,
    /// Azure style: keys go in the `api-key` header, tokens as bearer.
    Azure,
}

/// An access token issued by Azure AD.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    token: String,
    /// Expiry as reported by the issuer, if known.
    pub expires_on: Option<String>,
}

impl AccessToken {
    /// Creates a token from its secret value.
    pub fn new(token: impl Into<String>, expires_on: Option<String>) -> Self {
        Self {
            token: token.into(),
            expires_on,
        }
    }

    /// Returns the secret token value.
    pub fn secret(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// Credential for the hosted LLM service.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Static API key.
    ApiKey(String),
    /// Short-lived bearer token.
    AccessToken(AccessToken),
    /// No authentication (mock provider).
    Anonymous,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiKey(_) => write!(f, "ApiKey(<redacted>)"),
            Self::AccessToken(token) => f.debug_tuple("AccessToken").field(token).finish(),
            Self::Anonymous => write!(f, "Anonymous"),
        }
    }
}

impl Credential {
    /// Short description for logs (never includes the secret).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ApiKey(_) => "api key",
            Self::AccessToken(_) => "azure cli token",
            Self::Anonymous => "anonymous",
        }
    }

    /// Attaches the credential to a request.
    pub fn authorize(
        &self,
        request: reqwest::RequestBuilder,
        scheme: AuthScheme,
    ) -> reqwest::RequestBuilder {
        match (self, scheme) {
            (Self::ApiKey(key), AuthScheme::Azure) => request.header("api-key", key),
            (Self::ApiKey(key), AuthScheme::Bearer) => request.bearer_auth(key),
            (Self::AccessToken(token), _) => request.bearer_auth(token.secret()),
            (Self::Anonymous, _) => request,
        }
    }
}

/// What has to happen to obtain a credential.
#[derive(Debug, PartialEq, Eq)]
enum Plan {
    Ready(Credential),
    AzureCli,
}

/// Environment variable holding the API key for a provider.
pub fn api_key_var(provider: LlmProvider) -> Option<&'static str> {
    match provider {
        LlmProvider::OpenAi => Some("OPENAI_API_KEY"),
        LlmProvider::Azure => Some("AZURE_OPENAI_API_KEY"),
        LlmProvider::Mock => None,
    }
}

fn plan(
    source: CredentialSource,
    provider: LlmProvider,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Plan> {
    let Some(var) = api_key_var(provider) else {
        return Ok(Plan::Ready(Credential::Anonymous));
    };
    let key = lookup(var).filter(|k| !k.trim().is_empty());

    match (source, provider, key) {
        (CredentialSource::AzureCli, LlmProvider::Azure, _) => Ok(Plan::AzureCli),
        (CredentialSource::AzureCli, _, _) => Err(InsightError::credential(format!(
            "Azure CLI credentials only work with the azure provider, not {provider}"
        ))),
        (_, _, Some(key)) => Ok(Plan::Ready(Credential::ApiKey(key))),
        (CredentialSource::Auto, LlmProvider::Azure, None) => Ok(Plan::AzureCli),
        (_, _, None) => Err(InsightError::credential(format!(
            "No API key configured. Set {var}."
        ))),
    }
}

/// Acquires the credential for `provider` from `source`.
pub async fn acquire(source: CredentialSource, provider: LlmProvider) -> Result<Credential> {
    let credential = match plan(source, provider, |k| std::env::var(k).ok())? {
        Plan::Ready(credential) => credential,
        Plan::AzureCli => Credential::AccessToken(
            AzureCliCredential::default()
                .get_token(COGNITIVE_SERVICES_RESOURCE)
                .await?,
        ),
    };
    info!(provider = %provider, credential = credential.kind(), "Credential acquired");
    Ok(credential)
}

/// Obtains tokens from the identity the Azure CLI is logged in as.
#[derive(Debug, Clone)]
pub struct AzureCliCredential {
    program: String,
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        Self {
            program: "az".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    #[serde(default)]
    expires_on: Option<String>,
}

impl AzureCliCredential {
    /// Uses a different executable than `az` (e.g. a full path).
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Runs `az account get-access-token` for `resource`.
    pub async fn get_token(&self, resource: &str) -> Result<AccessToken> {
        debug!(program = %self.program, resource, "Requesting token from Azure CLI");

        let output = Command::new(&self.program)
            .args([
                "account",
                "get-access-token",
                "--output",
                "json",
                "--resource",
                resource,
            ])
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    InsightError::credential(
                        "Azure CLI not found. Install it and run `az login`.",
                    )
                } else {
                    InsightError::credential(format!("Failed to run Azure CLI: {e}"))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InsightError::credential(format!(
                "Azure CLI could not issue a token ({}). Run `az login`. {}",
                output.status,
                stderr.trim()
            )));
        }

        parse_cli_token(&output.stdout)
    }
}

fn parse_cli_token(stdout: &[u8]) -> Result<AccessToken> {
    let token: CliToken = serde_json::from_slice(stdout)
        .map_err(|e| InsightError::credential(format!("Unexpected Azure CLI output: {e}")))?;
    Ok(AccessToken::new(token.access_token, token.expires_on))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_mock_needs_no_credential() {
        let plan = plan(CredentialSource::Auto, LlmProvider::Mock, env(&[])).unwrap();
        assert_eq!(plan, Plan::Ready(Credential::Anonymous));
    }

    #[test]
    fn test_openai_key_from_env() {
        let plan = plan(
            CredentialSource::Auto,
            LlmProvider::OpenAi,
            env(&[("OPENAI_API_KEY", "sk-test")]),
        )
        .unwrap();
        assert_eq!(plan, Plan::Ready(Credential::ApiKey("sk-test".to_string())));
    }

    #[test]
    fn test_openai_without_key_fails() {
        let err = plan(CredentialSource::Auto, LlmProvider::OpenAi, env(&[])).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_openai_rejects_azure_cli() {
        let err = plan(CredentialSource::AzureCli, LlmProvider::OpenAi, env(&[])).unwrap_err();
        assert_eq!(err.category(), "Credential Error");
    }

    #[test]
    fn test_azure_auto_prefers_key() {
        let plan = plan(
            CredentialSource::Auto,
            LlmProvider::Azure,
            env(&[("AZURE_OPENAI_API_KEY", "abc")]),
        )
        .unwrap();
        assert_eq!(plan, Plan::Ready(Credential::ApiKey("abc".to_string())));
    }

    #[test]
    fn test_azure_auto_falls_back_to_cli() {
        let plan = plan(CredentialSource::Auto, LlmProvider::Azure, env(&[])).unwrap();
        assert_eq!(plan, Plan::AzureCli);
    }

    #[test]
    fn test_azure_cli_source_ignores_key() {
        let plan = plan(
            CredentialSource::AzureCli,
            LlmProvider::Azure,
            env(&[("AZURE_OPENAI_API_KEY", "abc")]),
        )
        .unwrap();
        assert_eq!(plan, Plan::AzureCli);
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let err = plan(
            CredentialSource::ApiKey,
            LlmProvider::Azure,
            env(&[("AZURE_OPENAI_API_KEY", "  ")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("AZURE_OPENAI_API_KEY"));
    }

    #[test]
    fn test_parse_cli_token() {
        let stdout = br#"{"accessToken":"eyJ0eXAi","expiresOn":"2026-10-19 12:00:00.000000","subscription":"s","tenant":"t","tokenType":"Bearer"}"#;
        let token = parse_cli_token(stdout).unwrap();
        assert_eq!(token.secret(), "eyJ0eXAi");
        assert_eq!(token.expires_on.as_deref(), Some("2026-10-19 12:00:00.000000"));
    }

    #[test]
    fn test_parse_cli_token_garbage() {
        assert!(parse_cli_token(b"ERROR: Please run 'az login'").is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let key = format!("{:?}", Credential::ApiKey("sk-secret".to_string()));
        let token = format!(
            "{:?}",
            Credential::AccessToken(AccessToken::new("tok-secret", None))
        );
        assert!(!key.contains("sk-secret"));
        assert!(!token.contains("tok-secret"));
    }

    #[tokio::test]
    async fn test_missing_cli_binary() {
        let err = AzureCliCredential::with_program("definitely-not-az-cli-xyz")
            .get_token(COGNITIVE_SERVICES_RESOURCE)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Azure CLI not found"));
    }
}
