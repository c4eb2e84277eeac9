// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use fleet_core::domain::fleet_config::{FleetConfigManifest, SimulationConfig};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./fleet-config.yaml)
        #[arg(short, long, default_value = "./fleet-config.yaml")]
        output: PathBuf,

        /// Include a sample simulation world
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output, examples } => generate(output, examples),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = FleetConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. FLEET_CONFIG_PATH: {}",
            std::env::var("FLEET_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./fleet-config.yaml");
        println!("  4. ~/.fleet/config.yaml");
        println!("  5. /etc/fleet/config.yaml");
        println!();
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Map:".bold());
    println!(
        "  Grid: {} x {} cells at {} m",
        spec.map.size, spec.map.size, spec.map.resolution
    );
    println!("  Inflation: {} m ({:?})", spec.map.inflation_radius, spec.map.neighborhood);
    println!("  Frozen: {}", spec.map.freeze);
    println!(
        "  Snapshot: {}",
        spec.map.snapshot_path.as_deref().unwrap_or("(none)")
    );
    println!();

    println!("{}", "Fleet:".bold());
    for robot in &spec.fleet.robots {
        println!("  {} start ({}, {})", robot.id.bold(), robot.start[0], robot.start[1]);
    }
    for (label, [x, y]) in &spec.fleet.locations {
        println!("  \"{}\" → ({}, {})", label, x, y);
    }
    println!();

    println!("{}", "Execution:".bold());
    println!("  Speed: {} m/s", spec.executor.speed);
    println!("  Goal tolerance: {} m", spec.executor.goal_tolerance);
    println!("  Max replans: {}", spec.executor.max_replans);
    println!("  Sensors: {}", spec.executor.sensors.join(", "));
    println!(
        "  Known-free cells: {}",
        spec.parking.known_free_path.as_deref().unwrap_or("(none)")
    );
    println!();

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = FleetConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

fn sample_manifest(with_examples: bool) -> FleetConfigManifest {
    let mut manifest = FleetConfigManifest::default();
    if with_examples {
        manifest.spec.simulation = Some(SimulationConfig {
            obstacles: vec![[1.0, 1.0]],
            walls: vec![[3.0, -2.0, 3.0, 2.0]],
            ..SimulationConfig::default()
        });
    }
    manifest
}

fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    sample_manifest(with_examples)
        .to_yaml_file(&output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_config_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet-config.yaml");
        generate(path.clone(), true).unwrap();

        let loaded = FleetConfigManifest::from_yaml_file(&path).unwrap();
        loaded.validate().unwrap();
        let sim = loaded.spec.simulation.unwrap();
        assert_eq!(sim.walls.len(), 1);
        assert_eq!(loaded.spec.fleet.robots.len(), 3);
    }
}
