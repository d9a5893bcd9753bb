//! Query planner agent: turns a question and a schema into SQL.

use std::sync::Arc;

use tracing::info;

use super::{Agent, AgentConfig, AgentRun, Question};
use crate::error::{InsightError, Result};
use crate::llm::{parse_llm_response, LlmClient};

/// Agent name registered with the hosted service.
pub const PLANNER_NAME: &str = "sql_query_generator_agent";

/// Renders the planner's instructions.
pub fn planner_instructions(schema: &str, question: &Question) -> String {
    format!(
        "You are a helpful agent meant to write SQL queries to query the data necessary for the provided schema: {schema}. \
         The user has the following question: {question}. \
         Write a SQL query to answer the user's question based on the provided schema."
    )
}

/// SQL produced by the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedQuery {
    /// The extracted SQL text. Not validated.
    pub sql: String,
    /// Text around the SQL block, if any.
    pub explanation: String,
    /// The raw agent run.
    pub run: AgentRun,
}

/// Writes SQL for one question.
#[derive(Debug)]
pub struct QueryPlanner {
    agent: Agent,
    question: Question,
}

impl QueryPlanner {
    /// Builds the planner from a validated configuration.
    ///
    /// The planner uses no hosted tools.
    pub fn new(config: &AgentConfig, client: Arc<dyn LlmClient>) -> Result<Self> {
        config.validate()?;
        if !config.capabilities.is_empty() {
            return Err(InsightError::config(
                "The query planner does not use hosted capabilities",
            ));
        }

        let instructions = planner_instructions(&config.schema, &config.question);
        Ok(Self {
            agent: Agent::new(PLANNER_NAME, instructions, Vec::new(), client),
            question: config.question.clone(),
        })
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Asks the model for SQL answering the question.
    pub async fn plan(&self) -> Result<PlannedQuery> {
        let run = self.agent.run(self.question.as_str()).await?;
        let parsed = parse_llm_response(&run.text);

        let sql = parsed
            .sql
            .ok_or_else(|| InsightError::llm("no SQL query in response"))?;
        info!(sql = %sql, "Planned query");

        Ok(PlannedQuery {
            sql,
            explanation: parsed.text,
            run,
        })
    }
}
