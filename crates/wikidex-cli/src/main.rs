//! Wikidex CLI - build the label store, ingest a dump, and ask questions
//! over a Wikidata-style knowledge base (§6).
//!
//! # Usage
//!
//! ```bash
//! wikidex build-labels dump.json
//! wikidex ingest dump.json
//! wikidex ask "Who is the mayor of Berlin?"
//! wikidex status
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;
mod progress;

/// Wikidex - retrieval-augmented question answering over Wikidata
#[derive(Parser, Debug)]
#[command(name = "wikidex")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
pub(crate) struct GlobalOptions {
    /// Path to a local configuration file, overriding the default
    /// global -> local merge
    #[arg(long, short = 'c', global = true, env = "WIKIDEX_CONFIG")]
    pub(crate) config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub(crate) verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub(crate) quiet: bool,

    /// Vector store connection string
    #[arg(long, global = true, env = "WIKIDEX_VECTORSTORE_CONNECTION_STRING")]
    vectorstore_connection_string: Option<String>,

    /// Embedding provider (local, openai)
    #[arg(long, global = true, env = "WIKIDEX_EMBEDDING_PROVIDER", value_parser = parse_embedding_provider)]
    embedding_provider: Option<wikidex_config::EmbeddingProviderType>,
}

fn parse_embedding_provider(s: &str) -> Result<wikidex_config::EmbeddingProviderType, String> {
    s.parse().map_err(|e: wikidex_config::ConfigError| e.to_string())
}

impl GlobalOptions {
    /// Convert global options to config overrides.
    pub fn to_config_overrides(&self) -> wikidex_config::ConfigOverrides {
        wikidex_config::ConfigOverrides {
            vectorstore_connection_string: self.vectorstore_connection_string.clone(),
            embedding_provider: self.embedding_provider,
            log_level: if self.quiet {
                Some("error".to_string())
            } else if self.verbose {
                Some("debug".to_string())
            } else {
                None
            },
            ..Default::default()
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Populate the label store from a dump
    BuildLabels(commands::build_labels::BuildLabelsArgs),

    /// Run the full ingest pipeline into the vector store
    Ingest(commands::ingest::IngestArgs),

    /// Ask a question, grounded in retrieved context
    Ask(commands::ask::AskArgs),

    /// Report reachability and row counts for the label/vector stores
    Status(commands::status::StatusArgs),

    /// View and manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.global.quiet {
        Level::ERROR
    } else if cli.global.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::BuildLabels(args) => commands::build_labels::execute(args, cli.global).await,
        Commands::Ingest(args) => commands::ingest::execute(args, cli.global).await,
        Commands::Ask(args) => commands::ask::execute(args, cli.global).await,
        Commands::Status(args) => commands::status::execute(args, cli.global).await,
        Commands::Config(cmd) => commands::config::execute(cmd, cli.global).await,
    }
}
