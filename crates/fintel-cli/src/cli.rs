//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Fintel - Transaction intelligence for personal finance data
#[derive(Parser)]
#[command(name = "fintel")]
#[command(about = "Categorize transactions, find patterns and anomalies, forecast spending", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Engine config file (defaults to the data directory override, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Never call the remote model; use heuristics only
    ///
    /// Without this flag the remote backend is chosen from AI_BACKEND,
    /// OLLAMA_HOST or OPENAI_COMPATIBLE_HOST when set.
    #[arg(long, global = true)]
    pub no_remote: bool,

    /// Print full JSON results instead of a summary
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where transactions and categories come from
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// JSON file: {"transactions": [...], "categories": [...]}
    #[arg(short, long, conflicts_with = "csv")]
    pub input: Option<PathBuf>,

    /// CSV file with columns id,date,description,amount[,category_id,merchant]
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// JSON file with a category array (combined with --csv)
    #[arg(long, requires = "csv")]
    pub categories: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Assign categories to uncategorized transactions
    Categorize {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Detect recurring, trend and seasonal patterns
    Patterns {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Flag unusual amounts, duplicate charges and new merchants
    Anomalies {
        #[command(flatten)]
        input: InputArgs,

        /// Detection time (YYYY-MM-DD or RFC 3339, default: now)
        #[arg(long)]
        as_of: Option<String>,
    },

    /// Forecast spending, income, budget status and savings
    Predict {
        #[command(flatten)]
        input: InputArgs,

        /// Forecast horizon: 1month, 3months, 6months, 12months
        #[arg(long, default_value = "3months")]
        horizon: String,

        /// Generation time (YYYY-MM-DD or RFC 3339, default: now)
        #[arg(long)]
        as_of: Option<String>,
    },

    /// Run every analysis at once
    Analyze {
        #[command(flatten)]
        input: InputArgs,

        /// Forecast horizon: 1month, 3months, 6months, 12months
        #[arg(long, default_value = "3months")]
        horizon: String,

        /// Generation time (YYYY-MM-DD or RFC 3339, default: now)
        #[arg(long)]
        as_of: Option<String>,
    },

    /// Manage AI prompts (list, show, path)
    Prompts {
        #[command(subcommand)]
        action: Option<PromptsAction>,
    },

    /// Show engine configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Check the remote model backend
    Remote {
        #[command(subcommand)]
        action: RemoteAction,
    },
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List all available prompts and their override status
    List,

    /// Show the content of a specific prompt
    Show {
        /// Prompt ID (e.g., categorize_transactions, detect_anomalies)
        prompt_id: String,
    },

    /// Show the path where prompt overrides should be placed
    Path,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Show the path where the config override should be placed
    Path,
}

#[derive(Subcommand)]
pub enum RemoteAction {
    /// Check connectivity and run a sample categorization
    Test,
}
