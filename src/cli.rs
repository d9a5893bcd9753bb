//! Command-line argument parsing for db-insight.

use clap::Parser;
use db_insight::agent::Question;
use db_insight::config::{Config, ConnectionConfig, CredentialSource};
use db_insight::error::{InsightError, Result};
use std::path::PathBuf;

/// Ask a database a question: one agent writes the SQL, another analyzes the result.
#[derive(Parser, Debug)]
#[command(name = "insight")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Question to answer (defaults to the first configured question)
    #[arg(value_name = "QUESTION", conflicts_with_all = ["question_index", "all"])]
    pub question: Option<String>,

    /// Answer the configured question with this 1-based index
    #[arg(short = 'n', long, value_name = "N", conflicts_with = "all")]
    pub question_index: Option<usize>,

    /// Answer every configured question in order
    #[arg(long)]
    pub all: bool,

    /// File with the schema description handed to the query planner
    #[arg(long, value_name = "PATH")]
    pub schema_file: Option<PathBuf>,

    /// Database connection string (postgres://..., sqlite://..., sqlite::memory:)
    #[arg(long, value_name = "URL", env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Use named connection from config
    #[arg(short = 'c', long, value_name = "NAME")]
    pub connection: Option<String>,

    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// LLM provider: azure, openai or mock (overrides config)
    #[arg(long, value_name = "PROVIDER")]
    pub llm: Option<String>,

    /// Model, or deployment name for Azure (overrides config)
    #[arg(long, value_name = "NAME")]
    pub model: Option<String>,

    /// Credential source: auto, api-key or azure-cli (overrides config)
    #[arg(long, value_name = "SOURCE")]
    pub credential: Option<CredentialSource>,

    /// Only plan the SQL; do not execute or analyze it
    #[arg(long, conflicts_with = "analyze_only")]
    pub plan_only: bool,

    /// Only run the analysis agent, without a dataset
    #[arg(long)]
    pub analyze_only: bool,

    /// Execute planned SQL even if it modifies data
    #[arg(long)]
    pub allow_writes: bool,

    /// Use the in-memory mock database
    #[arg(long)]
    pub mock_db: bool,

    /// Verbose logging (debug level)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Converts `--database-url` to a ConnectionConfig.
    pub fn to_connection_config(&self) -> Result<Option<ConnectionConfig>> {
        self.database_url
            .as_deref()
            .map(ConnectionConfig::from_connection_string)
            .transpose()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(Config::default_path)
    }

    /// Returns the named connection to use, if specified.
    pub fn connection_name(&self) -> Option<&str> {
        self.connection.as_deref()
    }

    /// Picks the questions to answer from the command line and the configured set.
    pub fn selected_questions(&self, configured: &[String]) -> Result<Vec<Question>> {
        if let Some(question) = &self.question {
            return Ok(vec![Question::new(question.as_str())?]);
        }

        if self.all {
            return configured.iter().map(|q| Question::new(q.as_str())).collect();
        }

        let index = self.question_index.unwrap_or(1);
        let text = index
            .checked_sub(1)
            .and_then(|i| configured.get(i))
            .ok_or_else(|| {
                InsightError::config(format!(
                    "Question index {index} is out of range (1-{})",
                    configured.len()
                ))
            })?;
        Ok(vec![Question::new(text.as_str())?])
    }
}
