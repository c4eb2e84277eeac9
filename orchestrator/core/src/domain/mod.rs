// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Fleet Domain Layer
//!
//! Pure types and algorithms. The only async items are the port traits in
//! [`ports`]; everything else is synchronous and I/O free.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`geometry`] | `Point2`, `Cell`, `GridGeometry` |
//! | [`grid`] | `OccupancyGrid`, `GridMap` |
//! | [`costmap`] | `CostMap`, `Neighborhood` |
//! | [`planner`] | `GridPlanner`, `PlannedPath` |
//! | [`sector`] | `Sector`, `Slot`, `SectorMask` |
//! | [`classifier`] | `SectorClassifier`, `SectorSummary` |
//! | [`parking`] | `ParkingRecord`, `ParkingSpot` |
//! | [`robot`] | `RobotId`, `RobotState`, `RobotStatus` |
//! | [`mission`] | `MissionId`, `MissionState`, `MissionOutcome` |
//! | [`command`] | `Command`, `CommandReply` |
//! | [`ports`] | `RobotPort`, `RobotConnector`, `SensorPoint` |
//! | [`kinematics`] | `MotionKind`, `Mecanum`, `WheelSpeeds` |
//! | [`events`] | `MissionEvent`, `ParkingEvent`, `MapEvent` |
//! | [`fleet_config`] | `FleetConfigManifest` |

pub mod geometry;
pub mod grid;
pub mod costmap;
pub mod planner;
pub mod sector;
pub mod classifier;
pub mod parking;
pub mod robot;
pub mod mission;
pub mod command;
pub mod ports;
pub mod kinematics;
pub mod events;
pub mod fleet_config;
