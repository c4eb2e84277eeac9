// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the fleet CLI

pub mod config;
pub mod map;
pub mod plan;
pub mod run;

pub use self::config::ConfigCommand;
pub use self::map::MapCommand;
pub use self::plan::PlanArgs;
pub use self::run::RunArgs;
