//! Network intrusion detector CLI
//!
//! A command-line tool for requesting predictions, reading live analytics
//! and controlling auto mode on a running detector.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{analytics, auto, predict};
use std::path::PathBuf;
use std::process::ExitCode;

/// Network intrusion detector CLI
#[derive(Parser)]
#[command(name = "ids")]
#[command(author, version, about = "CLI for the network intrusion detector", long_about = None)]
pub struct Cli {
    /// Detector API URL (can also be set via IDS_API_URL env var)
    #[arg(long, env = "IDS_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify a connection record
    Predict {
        /// Model to use: random_forest, decision_tree, xgboost, lightgbm or ensemble
        #[arg(long, short)]
        model: Option<String>,

        /// JSON file with the feature map; a sample is drawn when omitted
        #[arg(long)]
        features: Option<PathBuf>,
    },

    /// Show live statistics
    Stats,

    /// Show recent predictions, newest first
    History {
        /// Number of predictions to show
        #[arg(short, default_value_t = 20)]
        n: usize,
    },

    /// Show the activity log, newest first
    Activity {
        /// Number of entries to show
        #[arg(short, default_value_t = 20)]
        n: usize,
    },

    /// Reset statistics, history and the activity log
    Clear,

    /// List the loaded models
    Models,

    /// Control auto mode
    #[command(subcommand)]
    Auto(AutoCommands),
}

#[derive(Subcommand)]
pub enum AutoCommands {
    /// Start generating predictions from samples
    Start {
        /// Seconds between predictions (detector default when omitted)
        #[arg(long)]
        interval: Option<f64>,

        /// Model to use (detector default when omitted)
        #[arg(long, short)]
        model: Option<String>,
    },

    /// Stop auto mode
    Stop,

    /// Show auto mode state and counters
    Status,
}

async fn run(cli: Cli) -> Result<()> {
    let client = client::ApiClient::new(&cli.api_url)?;
    let format = cli.format;

    match cli.command {
        Commands::Predict { model, features } => {
            predict::predict(&client, model, features.as_deref(), format).await?;
        }
        Commands::Stats => analytics::show_stats(&client, format).await?,
        Commands::History { n } => analytics::show_history(&client, n, format).await?,
        Commands::Activity { n } => analytics::show_activity(&client, n, format).await?,
        Commands::Clear => analytics::clear(&client, format).await?,
        Commands::Models => predict::models(&client, format).await?,
        Commands::Auto(auto_cmd) => match auto_cmd {
            AutoCommands::Start { interval, model } => {
                auto::start(&client, interval, model, format).await?;
            }
            AutoCommands::Stop => auto::stop(&client, format).await?,
            AutoCommands::Status => auto::status(&client, format).await?,
        },
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
