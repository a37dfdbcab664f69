use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use graphql_docs_mcp::config::Config;
use graphql_docs_mcp::db::Db;
use graphql_docs_mcp::indexer::core::{IngestReport, Indexer};
use graphql_docs_mcp::mcp::server::{McpContext, McpServer};
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "GraphQL documentation index served over MCP")]
struct Cli {
    /// JSON config file (default: ./config.json when present)
    #[arg(long, global = true, default_value = "")]
    config: String,

    /// Documentation root directory
    #[arg(long, global = true)]
    docs: Option<String>,

    /// SQLite database path
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest the documentation, then serve MCP over stdio (default)
    Serve,
    /// Ingest the documentation and print a summary
    Ingest {
        /// Re-ingest even if nothing changed
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the MCP protocol, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Command::Ingest { force } => {
            let (db, report) = ingest(&config, force).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            close(db).await?;
        }
        Command::Serve => {
            tracing::info!("Starting graphql-docs-mcp...");
            let (db, _) = ingest(&config, false).await?;

            let ctx = McpContext {
                db: db.clone(),
                config: Arc::new(config),
            };
            McpServer::new(ctx).start().await?;
            close(db).await?;
        }
    }

    Ok(())
}

/// Defaults < config file < environment < command line.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(&cli.config)?;
    config.apply_env()?;
    if let Some(docs) = &cli.docs {
        config.docs_path = Some(docs.clone());
    }
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn ingest(config: &Config, force: bool) -> Result<(Arc<TokioMutex<Db>>, IngestReport)> {
    let root = config.resolve_docs_path()?;
    let db_path = config.prepare_db_path()?;

    let db = Db::open(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    let db = Arc::new(TokioMutex::new(db));

    let indexer = Indexer::new(db.clone(), &root, config)?;
    let report = indexer
        .ingest(force)
        .await
        .context("Documentation ingestion failed")?;
    Ok((db, report))
}

async fn close(db: Arc<TokioMutex<Db>>) -> Result<()> {
    match Arc::try_unwrap(db) {
        Ok(mutex) => mutex.into_inner().close().context("Failed to close database"),
        Err(_) => {
            tracing::warn!("Database still in use at shutdown");
            Ok(())
        }
    }
}
