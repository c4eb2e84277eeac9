// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod context;
pub mod planning;
pub mod motion;
pub mod resolver;
pub mod executor;
pub mod supervisor;

pub use context::FleetContext;
pub use executor::PathExecutor;
pub use planning::PlanningService;
pub use resolver::{ConflictResolver, ResolverError};
pub use supervisor::FleetSupervisor;
