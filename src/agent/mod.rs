//! Agents backed by the hosted LLM service.
//!
//! An agent is a named, stateless bundle of instructions and hosted
//! capabilities. It is rendered from a validated [`AgentConfig`], never
//! mutated afterwards, and recreated for every question.

pub mod analyst;
pub mod planner;

pub use analyst::{analysis_prompt, analyst_instructions, AnalysisAgent, Dataset};
pub use planner::{planner_instructions, PlannedQuery, QueryPlanner};

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{InsightError, Result};
use crate::llm::{Capability, CodeOutput, CodeRun, CompletionRequest, LlmClient, Message};

/// A natural-language question about the data. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question(String);

impl Question {
    /// Creates a question, rejecting empty or all-whitespace text.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(InsightError::config("Question must not be empty"));
        }
        Ok(Self(text))
    }

    /// Returns the question text as given.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Question {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Structured configuration from which an agent's instructions are rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Schema description; may be empty.
    pub schema: String,
    /// The user's question.
    pub question: Question,
    /// Hosted capabilities the agent may use.
    pub capabilities: Vec<Capability>,
}

impl AgentConfig {
    /// Configuration for the query planner: schema and question, no tools.
    pub fn for_planner(schema: impl Into<String>, question: Question) -> Self {
        Self {
            schema: schema.into(),
            question,
            capabilities: Vec::new(),
        }
    }

    /// Configuration for the analysis agent: question plus code interpreter.
    pub fn for_analyst(question: Question) -> Self {
        Self {
            schema: String::new(),
            question,
            capabilities: vec![Capability::CodeInterpreter],
        }
    }

    /// Checks the configuration before an agent is built from it.
    pub fn validate(&self) -> Result<()> {
        for (i, capability) in self.capabilities.iter().enumerate() {
            if self.capabilities[..i].contains(capability) {
                return Err(InsightError::config(format!(
                    "Capability {capability} listed more than once"
                )));
            }
        }
        Ok(())
    }
}

/// A configured agent bound to an LLM client.
pub struct Agent {
    name: String,
    instructions: String,
    capabilities: Vec<Capability>,
    client: Arc<dyn LlmClient>,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("instructions", &self.instructions)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Creates an agent.
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        capabilities: Vec<Capability>,
        client: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            capabilities,
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Invokes the agent with a single user prompt.
    pub async fn run(&self, prompt: &str) -> Result<AgentRun> {
        info!(agent = %self.name, "Running agent");
        debug!(agent = %self.name, instructions = %self.instructions, prompt, "Agent request");

        let request = CompletionRequest {
            agent: self.name.clone(),
            instructions: self.instructions.clone(),
            messages: vec![Message::user(prompt)],
            capabilities: self.capabilities.clone(),
        };

        let response = self.client.complete(&request).await?;

        debug!(
            agent = %self.name,
            code_runs = response.code_runs.len(),
            "Agent finished"
        );

        Ok(AgentRun {
            agent: self.name.clone(),
            text: response.content,
            code_runs: response.code_runs,
        })
    }
}

/// Result of one agent invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRun {
    /// Name of the agent that produced this run.
    pub agent: String,
    /// The model's text reply.
    pub text: String,
    /// Code executed by the hosted code interpreter.
    pub code_runs: Vec<CodeRun>,
}

impl fmt::Display for AgentRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text.trim_end())?;
        for (i, run) in self.code_runs.iter().enumerate() {
            write!(f, "\n\n[code run {}]\n{}", i + 1, run.code.trim_end())?;
            for output in &run.outputs {
                match output {
                    CodeOutput::Logs { text } => write!(f, "\n[output]\n{}", text.trim_end())?,
                    CodeOutput::Image { url } => write!(f, "\n[image] {url}")?,
                }
            }
        }
        Ok(())
    }
}
