// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Meterr - operator CLI for the usage-telemetry queue.
//!
//! Inspects and drains the local durable queue, manages dead letters, and
//! exposes the token estimator and cost calculator for spot checks.

mod dead_letters;
mod estimate;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use meterr_config::MeterrConfig;
use meterr_core::MeterrError;

/// Meterr - usage telemetry for LLM API calls.
#[derive(Parser, Debug)]
#[command(name = "meterr", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output.
    #[arg(long, global = true)]
    plain: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Show queue depth, oldest pending entry and dead-letter count.
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Deliver queued records now.
    Flush,
    /// List dead-lettered records.
    DeadLetters {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Move dead letters back to the live queue.
    Requeue {
        /// Requeue every dead letter.
        #[arg(long, conflicts_with = "ids")]
        all: bool,
        /// Local ids as shown by `meterr dead-letters`.
        #[arg(required_unless_present = "all")]
        ids: Vec<i64>,
    },
    /// Estimate tokens for a text.
    Estimate {
        #[arg(long)]
        model: String,
        /// Read the text from a file.
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
        #[arg(required_unless_present = "file")]
        text: Option<String>,
    },
    /// Compute the cost of a call.
    Cost {
        #[arg(long)]
        model: String,
        #[arg(long)]
        input: u32,
        #[arg(long)]
        output: u32,
    },
    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => meterr_config::load_and_validate_path(path),
        None => meterr_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            meterr_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging.level);

    let result = match cli.command {
        Some(Commands::Status { json }) => status::run_status(&config, json, cli.plain).await,
        Some(Commands::Flush) => status::run_flush(&config, cli.plain).await,
        Some(Commands::DeadLetters { limit, json }) => {
            dead_letters::run_list(&config, limit, json).await
        }
        Some(Commands::Requeue { all, ids }) => {
            dead_letters::run_requeue(&config, all, &ids).await
        }
        Some(Commands::Estimate { model, file, text }) => {
            estimate::run_estimate(&model, file.as_deref(), text.as_deref())
        }
        Some(Commands::Cost {
            model,
            input,
            output,
        }) => {
            estimate::run_cost(&config, &model, input, output);
            Ok(())
        }
        Some(Commands::Config) => print_config(&config),
        None => {
            println!("meterr: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("meterr: {e}");
        std::process::exit(1);
    }
}

/// Print the configuration as TOML with the collector credential masked.
fn print_config(config: &MeterrConfig) -> Result<(), MeterrError> {
    print!("{}", render_config(config)?);
    Ok(())
}

fn render_config(config: &MeterrConfig) -> Result<String, MeterrError> {
    let mut shown = config.clone();
    if shown.collector.api_key.is_some() {
        shown.collector.api_key = Some("********".to_string());
    }
    toml::to_string_pretty(&shown)
        .map_err(|e| MeterrError::Internal(format!("failed to render config: {e}")))
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("meterr={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn requeue_requires_ids_or_all() {
        assert!(Cli::try_parse_from(["meterr", "requeue"]).is_err());
        assert!(Cli::try_parse_from(["meterr", "requeue", "--all"]).is_ok());
        assert!(Cli::try_parse_from(["meterr", "requeue", "3", "7"]).is_ok());
        assert!(Cli::try_parse_from(["meterr", "requeue", "--all", "3"]).is_err());
    }

    #[test]
    fn estimate_takes_text_or_file() {
        assert!(Cli::try_parse_from(["meterr", "estimate", "--model", "gpt-4"]).is_err());
        assert!(Cli::try_parse_from(["meterr", "estimate", "--model", "gpt-4", "hello"]).is_ok());
        assert!(
            Cli::try_parse_from(["meterr", "estimate", "--model", "gpt-4", "--file", "p.txt"])
                .is_ok()
        );
    }

    #[test]
    fn rendered_config_masks_api_key() {
        let mut config = MeterrConfig::default();
        config.collector.api_key = Some("sk-secret".into());
        let rendered = render_config(&config).unwrap();
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("********"));

        let reparsed = meterr_config::load_config_from_str(&rendered).unwrap();
        assert_eq!(reparsed.delivery.batch_size, config.delivery.batch_size);
    }
}
