//! risk-scan - token risk scoring and red-flag detection
//!
//! Scores are best-effort heuristics, not financial advice. A missing source
//! lowers the score; it never counts as clean.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

use token_risk_engine::cli::commands::{self, AnalyzeOptions};
use token_risk_engine::config::Config;
use token_risk_engine::scoring::ReportKind;

/// Token risk scanner
#[derive(Parser)]
#[command(name = "risk-scan")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml", env = "RISK_CONFIG")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a token
    Analyze {
        /// Token mint address
        token: String,

        /// JSON file with an array of source payloads
        #[arg(short, long)]
        sources: Option<PathBuf>,

        /// JSON file with an array of transaction records
        #[arg(long)]
        history: Option<PathBuf>,

        /// Report kind: composite or security (defaults to config)
        #[arg(short, long)]
        kind: Option<ReportKind>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Source collection deadline in ms (0 = config default)
        #[arg(long, default_value_t = 0)]
        deadline_ms: u32,
    },

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "token_risk_engine=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Analyze {
            token,
            sources,
            history,
            kind,
            json,
            deadline_ms,
        } => {
            let options = AnalyzeOptions {
                sources: sources.as_deref(),
                history: history.as_deref(),
                kind,
                json,
                deadline_ms,
            };
            commands::analyze(&config, &token, options).await
        }
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
