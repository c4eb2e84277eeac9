// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Fleet Orchestrator CLI
//!
//! The `fleet` binary hosts the fleet supervisor and its offline tools.
//!
//! ## Commands
//!
//! - `fleet run` - Serve JSON-line commands against the simulated fleet
//! - `fleet plan FROM TO` - Offline route query on the saved map
//! - `fleet map info|clear|export` - Map snapshot maintenance
//! - `fleet config show|validate|generate` - Configuration management

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::debug;

use fleet_cli::commands::{self, ConfigCommand, MapCommand, PlanArgs, RunArgs};
use fleet_cli::logging::{init_logging, LogFormat, LogSettings};

/// Fleet Orchestrator - plan, dispatch and deconflict a robot fleet
#[derive(Parser)]
#[command(name = "fleet")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "FLEET_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error) [default: observability.logging.level]
    #[arg(long, global = true, env = "FLEET_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log line format [default: observability.logging.format]
    #[arg(long, global = true, env = "FLEET_LOG_FORMAT", value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the fleet supervisor
    #[command(name = "run")]
    Run(RunArgs),

    /// Plan a route on the saved map
    #[command(name = "plan")]
    Plan(PlanArgs),

    /// Map snapshot maintenance
    #[command(name = "map")]
    Map {
        #[command(subcommand)]
        command: MapCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    let settings = LogSettings::resolve(cli.config.clone(), cli.log_level.clone(), cli.log_format);
    init_logging(&settings.level, settings.format)?;
    if let Ok(path) = dotenv {
        debug!(path = %path.display(), "Loaded environment file");
    }

    match cli.command {
        Some(Commands::Run(args)) => {
            commands::run::execute(args, cli.config).await?;
            // A blocked stdin read would otherwise hold the runtime open.
            std::process::exit(0);
        }
        Some(Commands::Plan(args)) => commands::plan::execute(args, cli.config).await,
        Some(Commands::Map { command }) => commands::map::handle_command(command, cli.config).await,
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}
