//! db-insight - ask a database a question.

mod cli;
mod logging;

use std::path::Path;
use std::sync::Arc;

use cli::Cli;
use db_insight::config::{Config, ConnectionConfig, LlmConfig};
use db_insight::credential;
use db_insight::db::{self, DatabaseClient, MockDatabaseClient};
use db_insight::error::{InsightError, Result};
use db_insight::llm::{create_client, LlmProvider};
use db_insight::pipeline::{Pipeline, PipelineOptions};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    logging::init_stderr_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let questions = cli.selected_questions(&config.analysis.questions)?;
    let schema = resolve_schema(&cli, &config)?;

    let llm_config = resolve_llm_config(&cli, &config);
    let provider: LlmProvider = llm_config.provider.parse().map_err(InsightError::config)?;
    let credential = Arc::new(credential::acquire(llm_config.credential, provider).await?);
    let client = create_client(&llm_config, credential)?;

    let database = if cli.analyze_only {
        None
    } else {
        open_database(&cli, &config).await?
    };

    let pipeline = Pipeline::new(
        client,
        database.clone(),
        PipelineOptions {
            allow_writes: cli.allow_writes,
            plan_only: cli.plan_only,
            schema,
        },
    );

    for question in &questions {
        if cli.analyze_only {
            let run = pipeline.analyze_only(question).await?;
            println!("{run}");
        } else {
            let report = pipeline.run(question).await?;
            println!("{report}");
        }
    }

    if let Some(db) = database {
        db.close().await?;
    }

    Ok(())
}

/// Applies CLI overrides to the configured LLM settings.
fn resolve_llm_config(cli: &Cli, config: &Config) -> LlmConfig {
    let mut llm = config.llm.clone();
    if let Some(provider) = &cli.llm {
        llm.provider = provider.clone();
    }
    if let Some(model) = &cli.model {
        llm.model = Some(model.clone());
    }
    if let Some(credential) = cli.credential {
        llm.credential = credential;
    }
    llm
}

/// Schema text from `--schema-file` or the config; `None` means introspect.
fn resolve_schema(cli: &Cli, config: &Config) -> Result<Option<String>> {
    match &cli.schema_file {
        Some(path) => read_schema_file(path).map(Some),
        None => Ok(config.analysis.schema.clone()),
    }
}

fn read_schema_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        InsightError::config(format!(
            "Failed to read schema file {}: {e}",
            path.display()
        ))
    })
}

async fn open_database(cli: &Cli, config: &Config) -> Result<Option<Arc<dyn DatabaseClient>>> {
    if cli.mock_db {
        info!("Using mock database");
        let mock: Arc<dyn DatabaseClient> = Arc::new(MockDatabaseClient::new());
        return Ok(Some(mock));
    }

    match resolve_connection(cli, config)? {
        Some(conn) => {
            info!("Connection: {}", conn.display_string());
            let client = db::connect(&conn).await?;
            Ok(Some(Arc::from(client)))
        }
        None => {
            warn!("No database connection configured; answers stop after planning");
            Ok(None)
        }
    }
}

/// Resolves the final connection configuration from CLI args, config file, and environment.
fn resolve_connection(cli: &Cli, config: &Config) -> Result<Option<ConnectionConfig>> {
    // --database-url (or DATABASE_URL) wins
    if let Some(conn) = cli.to_connection_config()? {
        return Ok(Some(conn));
    }

    let mut connection = match cli.connection_name() {
        Some(name) => Some(config.get_connection(Some(name)).cloned().ok_or_else(|| {
            InsightError::config(format!("Connection '{}' not found in config file", name))
        })?),
        None => config.get_connection(None).cloned(),
    };

    // Apply environment variable defaults
    if let Some(ref mut conn) = connection {
        conn.apply_env_defaults();
        return Ok(connection);
    }

    Ok(ConnectionConfig::from_env())
}
