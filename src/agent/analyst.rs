//! Analysis agent: analyzes query results with the hosted code interpreter.

use std::sync::Arc;

use super::{Agent, AgentConfig, AgentRun, Question};
use crate::db::QueryResult;
use crate::error::{InsightError, Result};
use crate::llm::{Capability, LlmClient};

/// Agent name registered with the hosted service.
pub const ANALYST_NAME: &str = "code_interpreter_agent";

/// Prompt the analysis agent is invoked with.
pub const ANALYSIS_PROMPT: &str = "Analyze this dataset and create a visualization";

/// Maximum data rows rendered into the prompt.
pub const MAX_PROMPT_ROWS: usize = 200;

/// Renders the analysis agent's instructions.
pub fn analyst_instructions(question: &Question) -> String {
    format!(
        "You are a code interpreter agent. You will be provided with the results of a query from a SQL database. \
         Write the code necessary to analyze it and then return the answer to the user's question: {question}"
    )
}

/// An executed query and its result.
#[derive(Debug, Clone, Copy)]
pub struct Dataset<'a> {
    pub sql: &'a str,
    pub result: &'a QueryResult,
}

/// Builds the prompt, appending the query and its CSV when there is data.
pub fn analysis_prompt(dataset: Option<Dataset<'_>>) -> String {
    let Some(dataset) = dataset else {
        return ANALYSIS_PROMPT.to_string();
    };

    format!(
        "{ANALYSIS_PROMPT}\n\nQuery:\n```sql\n{}\n```\n\nResult ({}):\n```csv\n{}```",
        dataset.sql.trim(),
        dataset.result.summary(),
        dataset.result.to_csv(MAX_PROMPT_ROWS)
    )
}

/// Analyzes data for one question.
#[derive(Debug)]
pub struct AnalysisAgent {
    agent: Agent,
}

impl AnalysisAgent {
    /// Builds the analysis agent from a validated configuration.
    ///
    /// The configuration must enable exactly the code interpreter.
    pub fn new(config: &AgentConfig, client: Arc<dyn LlmClient>) -> Result<Self> {
        config.validate()?;
        if config.capabilities != [Capability::CodeInterpreter] {
            return Err(InsightError::config(
                "The analysis agent requires exactly the code interpreter capability",
            ));
        }

        let instructions = analyst_instructions(&config.question);
        Ok(Self {
            agent: Agent::new(
                ANALYST_NAME,
                instructions,
                config.capabilities.clone(),
                client,
            ),
        })
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Runs the analysis over `dataset`, or with the bare prompt when there is none.
    pub async fn analyze(&self, dataset: Option<Dataset<'_>>) -> Result<AgentRun> {
        self.agent.run(&analysis_prompt(dataset)).await
    }
}
