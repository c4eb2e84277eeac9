// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod repositories;
pub mod event_bus;
pub mod map_store;
pub mod cell_list;
pub mod scan_codec;
pub mod obstacle_decisions;
pub mod command_intake;
pub mod sim;

pub use event_bus::{EventBus, EventReceiver, FleetEvent};
pub use map_store::{MapStore, MapStoreError};
pub use obstacle_decisions::{DecisionTicket, ObstacleDecision, ObstacleDecisionService};
pub use repositories::FleetStateStore;
pub use sim::{SimSettings, SimWorld};
