//! Question answering pipeline.
//!
//! Runs plan → classify → execute → analyze for one question at a time. Each
//! stage builds its agent fresh from the question; nothing is carried over
//! between questions except the cached schema text.

use std::fmt;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::agent::{
    AgentConfig, AgentRun, AnalysisAgent, Dataset, PlannedQuery, QueryPlanner, Question,
};
use crate::db::{DatabaseBackend, DatabaseClient, QueryResult};
use crate::error::{InsightError, Result};
use crate::llm::LlmClient;
use crate::safety::{classify_sql, ClassificationResult};

/// Rows of the query result printed in a report.
const REPORT_PREVIEW_ROWS: usize = 20;

/// Pipeline behavior switches.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Execute SQL even when it is not read-only.
    pub allow_writes: bool,
    /// Stop after planning.
    pub plan_only: bool,
    /// Schema text for the planner; introspected from the database when unset.
    pub schema: Option<String>,
}

/// Drives both agents and the database for each question.
pub struct Pipeline {
    client: Arc<dyn LlmClient>,
    database: Option<Arc<dyn DatabaseClient>>,
    options: PipelineOptions,
    schema: OnceCell<String>,
}

impl Pipeline {
    /// Creates a pipeline. Without a database it only plans.
    pub fn new(
        client: Arc<dyn LlmClient>,
        database: Option<Arc<dyn DatabaseClient>>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            client,
            database,
            options,
            schema: OnceCell::new(),
        }
    }

    /// Returns the schema text handed to the planner, resolving it once.
    pub async fn schema(&self) -> Result<&str> {
        let schema = self
            .schema
            .get_or_try_init(|| self.resolve_schema())
            .await?;
        Ok(schema.as_str())
    }

    async fn resolve_schema(&self) -> Result<String> {
        if let Some(schema) = &self.options.schema {
            return Ok(schema.clone());
        }
        let Some(db) = &self.database else {
            return Ok(String::new());
        };

        let schema = db.introspect_schema().await?;
        if schema.is_empty() {
            warn!("Database has no tables; planning without a schema");
        }
        Ok(schema.format_for_llm())
    }

    fn backend(&self) -> DatabaseBackend {
        self.database
            .as_ref()
            .map(|db| db.backend())
            .unwrap_or_default()
    }

    /// Answers one question.
    pub async fn run(&self, question: &Question) -> Result<PipelineReport> {
        info!(question = %question, "Answering question");

        let schema = self.schema().await?.to_string();
        let planner = QueryPlanner::new(
            &AgentConfig::for_planner(schema.clone(), question.clone()),
            self.client.clone(),
        )?;
        let PlannedQuery {
            sql, explanation, ..
        } = planner.plan().await?;

        let classification = classify_sql(&sql, self.backend());
        info!(classification = %classification, "Classified planned SQL");

        let mut report = PipelineReport {
            question: question.clone(),
            schema,
            sql,
            explanation,
            classification,
            result: None,
            analysis: None,
        };

        let database = match &self.database {
            Some(db) if !self.options.plan_only => db,
            _ => {
                info!("Planning only; skipping execution and analysis");
                return Ok(report);
            }
        };

        if !report.classification.is_read_only() && !self.options.allow_writes {
            return Err(InsightError::query(format!(
                "Refusing to execute {} SQL. Pass --allow-writes to run it.",
                report.classification
            )));
        }

        let result = if self.options.allow_writes {
            database.execute_query(&report.sql).await?
        } else {
            database.execute_read_only(&report.sql).await?
        };
        info!(summary = %result.summary(), "Query executed");

        let analyst = AnalysisAgent::new(
            &AgentConfig::for_analyst(question.clone()),
            self.client.clone(),
        )?;
        let analysis = analyst
            .analyze(Some(Dataset {
                sql: &report.sql,
                result: &result,
            }))
            .await?;

        report.result = Some(result);
        report.analysis = Some(analysis);
        Ok(report)
    }

    /// Runs only the analysis agent with the bare prompt and no dataset.
    pub async fn analyze_only(&self, question: &Question) -> Result<AgentRun> {
        info!(question = %question, "Running analysis agent without a dataset");
        let analyst = AnalysisAgent::new(
            &AgentConfig::for_analyst(question.clone()),
            self.client.clone(),
        )?;
        analyst.analyze(None).await
    }
}

/// Everything produced while answering one question.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub question: Question,
    /// Schema text the planner saw.
    pub schema: String,
    pub sql: String,
    /// Planner text around the SQL.
    pub explanation: String,
    pub classification: ClassificationResult,
    /// Query result, when the SQL was executed.
    pub result: Option<QueryResult>,
    /// Analysis agent output, when the SQL was executed.
    pub analysis: Option<AgentRun>,
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Question: {}", self.question)?;
        if self.schema.is_empty() {
            writeln!(f, "Schema: (none)")?;
        } else {
            writeln!(f, "Schema: {}", self.schema)?;
        }
        if !self.explanation.is_empty() {
            writeln!(f, "\nPlanner: {}", self.explanation)?;
        }
        writeln!(f, "\nSQL:\n{}", self.sql)?;
        writeln!(f, "Safety: {}", self.classification)?;

        match &self.result {
            Some(result) => {
                writeln!(f, "\nResult: {}", result.summary())?;
                write!(f, "{}", result.to_csv(REPORT_PREVIEW_ROWS))?;
            }
            None => writeln!(f, "\nResult: not executed")?,
        }

        if let Some(analysis) = &self.analysis {
            writeln!(f, "\nAnalysis:\n{analysis}")?;
        }
        Ok(())
    }
}
