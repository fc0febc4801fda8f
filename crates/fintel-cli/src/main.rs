//! Fintel CLI - Transaction intelligence engine
//!
//! Usage:
//!   fintel categorize --input data.json     Assign categories
//!   fintel patterns --csv tx.csv            Find recurring charges and trends
//!   fintel anomalies --input data.json      Flag unusual transactions
//!   fintel predict --horizon 6months ...    Forecast spending and savings
//!   fintel analyze --input data.json        Run everything

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    // Logs go to stderr so JSON output on stdout stays parseable
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();

    let opts = commands::EngineOptions {
        config: cli.config.clone(),
        no_remote: cli.no_remote,
        json: cli.json,
    };

    match cli.command {
        Commands::Categorize { input } => commands::cmd_categorize(&opts, &input).await,
        Commands::Patterns { input } => commands::cmd_patterns(&opts, &input).await,
        Commands::Anomalies { input, as_of } => {
            commands::cmd_anomalies(&opts, &input, as_of.as_deref()).await
        }
        Commands::Predict {
            input,
            horizon,
            as_of,
        } => commands::cmd_predict(&opts, &input, &horizon, as_of.as_deref()).await,
        Commands::Analyze {
            input,
            horizon,
            as_of,
        } => commands::cmd_analyze(&opts, &input, &horizon, as_of.as_deref()).await,
        Commands::Prompts { action } => match action {
            None | Some(PromptsAction::List) => commands::cmd_prompts_list(),
            Some(PromptsAction::Show { prompt_id }) => commands::cmd_prompts_show(&prompt_id),
            Some(PromptsAction::Path) => commands::cmd_prompts_path(),
        },
        Commands::Config { action } => match action {
            None | Some(ConfigAction::Show) => commands::cmd_config_show(&opts),
            Some(ConfigAction::Path) => commands::cmd_config_path(),
        },
        Commands::Remote { action } => match action {
            RemoteAction::Test => commands::cmd_remote_test().await,
        },
    }
}
