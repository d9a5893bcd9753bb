//! Request and response types for hosted agent calls.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message (prompt).
    User,
    /// Assistant message (earlier model output).
    Assistant,
}

impl Role {
    /// Returns the role as a string for API requests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single input message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender.
    pub role: Role,
    /// The content of the message.
    pub content: String,
}

impl Message {
    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A hosted capability an agent may use while answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Sandboxed code execution run by the hosted service.
    CodeInterpreter,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CodeInterpreter => write!(f, "code_interpreter"),
        }
    }
}

/// Everything the hosted service needs to answer one agent invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// Name of the agent issuing the request (for logs and tracing).
    pub agent: String,
    /// System-level instructions.
    pub instructions: String,
    /// Input messages, usually a single user prompt.
    pub messages: Vec<Message>,
    /// Hosted tools enabled for this call.
    pub capabilities: Vec<Capability>,
}

impl CompletionRequest {
    /// Returns true if the given capability is enabled.
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Returns the content of the last user message.
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Output produced by one hosted code-interpreter call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CodeOutput {
    /// Captured stdout/stderr.
    Logs { text: String },
    /// A generated image (e.g. a chart), referenced by URL.
    Image { url: String },
}

/// One execution of generated code inside the hosted sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRun {
    /// The code the model wrote.
    pub code: String,
    /// What running it produced.
    pub outputs: Vec<CodeOutput>,
}

/// Response from the hosted service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LlmResponse {
    /// Text content from the model.
    pub content: String,
    /// Code executed by the hosted code interpreter, in order.
    pub code_runs: Vec<CodeRun>,
}

impl LlmResponse {
    /// Creates a response with only text content.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            code_runs: Vec::new(),
        }
    }

    /// Adds a code run.
    pub fn with_code_run(mut self, run: CodeRun) -> Self {
        self.code_runs.push(run);
        self
    }
}
