// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::{Context, Result};
use clap::ValueEnum;
use std::path::PathBuf;

use fleet_core::domain::fleet_config::{FleetConfigManifest, LoggingConfig};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    /// Unknown names fall back to compact.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub format: LogFormat,
}

impl LogSettings {
    /// Flags and their env vars win over `observability.logging`. A config
    /// that fails to load contributes the defaults.
    pub fn resolve(
        config: Option<PathBuf>,
        level: Option<String>,
        format: Option<LogFormat>,
    ) -> Self {
        let logging = FleetConfigManifest::load_or_default(config)
            .ok()
            .and_then(|c| c.spec.observability)
            .map(|o| o.logging)
            .unwrap_or_default();
        Self::merge(&logging, level, format)
    }

    pub fn merge(logging: &LoggingConfig, level: Option<String>, format: Option<LogFormat>) -> Self {
        Self {
            level: level.unwrap_or_else(|| logging.level.clone()),
            format: format.unwrap_or_else(|| LogFormat::from_name(&logging.format)),
        }
    }
}

/// `RUST_LOG` wins over `level` when set. Logs go to stderr so stdout stays
/// a clean reply stream.
pub fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Compact => builder.with_target(false).compact().init(),
        LogFormat::Json => builder.with_target(true).json().init(),
    }

    Ok(())
}
