// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `fleet run`: serve JSON-line commands against the simulated fleet.
//!
//! Commands are read from stdin or a file, replies go to stdout one JSON
//! object per line. The run ends on Ctrl+C/SIGTERM, or once the intake is
//! exhausted and every mission has finished.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use tokio::io::BufReader;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info};

use fleet_core::application::FleetSupervisor;
use fleet_core::domain::events::MissionEvent;
use fleet_core::domain::fleet_config::FleetConfigManifest;
use fleet_core::domain::mission::MissionOutcome;
use fleet_core::infrastructure::command_intake::{pump_commands, write_replies};
use fleet_core::infrastructure::{EventReceiver, FleetEvent};

use crate::fleet::build_sim_fleet;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Read commands from FILE instead of stdin
    #[arg(long, value_name = "FILE")]
    pub commands: Option<PathBuf>,

    /// Echo mission and parking events to stderr as JSON lines
    #[arg(long)]
    pub events: bool,
}

pub async fn execute(args: RunArgs, config_override: Option<PathBuf>) -> Result<()> {
    let config = FleetConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    let (ctx, _world) = build_sim_fleet(&config)?;
    let buffer = config.spec.supervisor.command_buffer.max(1);
    let (cmd_tx, cmd_rx) = mpsc::channel(buffer);
    let (reply_tx, reply_rx) = mpsc::channel(buffer);

    if args.events {
        tokio::spawn(print_events(ctx.events.subscribe()));
    }

    let intake = match args.commands {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open command file {}", path.display()))?;
            info!(path = %path.display(), "Reading commands from file");
            tokio::spawn(pump_commands(BufReader::new(file), cmd_tx))
        }
        None => {
            info!("Reading commands from stdin");
            tokio::spawn(pump_commands(BufReader::new(tokio::io::stdin()), cmd_tx))
        }
    };
    let writer = tokio::spawn(write_replies(reply_rx, tokio::io::stdout()));

    let outcomes = FleetSupervisor::new(ctx)
        .run(cmd_rx, reply_tx, shutdown_signal())
        .await;

    // The intake may still be parked on a stdin read after a signal.
    intake.abort();
    if let Ok(Ok(stats)) = intake.await {
        info!(accepted = stats.accepted, rejected = stats.rejected, "Command intake finished");
    }
    match writer.await {
        Ok(Ok(written)) => info!(replies = written, "Reply stream closed"),
        Ok(Err(e)) => error!(error = %e, "Failed writing replies"),
        Err(e) => error!(error = %e, "Reply writer task failed"),
    }

    print_summary(&outcomes);
    Ok(())
}

async fn print_events(mut events: EventReceiver) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(fleet_core::infrastructure::event_bus::EventBusError::Lagged(_)) => continue,
            Err(_) => break,
        };
        if matches!(event, FleetEvent::Mission(MissionEvent::TrajectorySample { .. })) {
            continue;
        }
        if let Ok(line) = serde_json::to_string(&event) {
            eprintln!("{line}");
        }
    }
}

fn print_summary(outcomes: &[MissionOutcome]) {
    if outcomes.is_empty() {
        return;
    }
    eprintln!("{}", "Missions:".bold());
    for outcome in outcomes {
        let state = if outcome.is_done() {
            "done".green()
        } else {
            "failed".red()
        };
        eprintln!(
            "  {} {} replans={} {:.1}s {}",
            outcome.robot,
            state,
            outcome.replans,
            outcome.elapsed.as_secs_f64(),
            outcome.reason.as_deref().unwrap_or("").dimmed()
        );
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received SIGTERM signal"),
    }
}
