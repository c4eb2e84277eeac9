// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `fleet-core`: Multi-Robot Planning & Execution Core
//!
//! Coordinates a small fleet of omnidirectional robots sharing one workspace:
//! goal dispatch, A* route planning over a persistent occupancy map, per-robot
//! waypoint execution against live range-sensor data, and the parking
//! protocol that moves a blocking robot out of the way.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | grid, costmap, planner, sector classifier, parking rules, ports |
//! | [`application`] | Application | path executor, conflict resolver, fleet supervisor |
//! | [`infrastructure`] | Infrastructure | state store, event bus, map snapshots, simulator, command intake |
//!
//! ## Concurrency
//!
//! One tokio task per active mission. The grid and the fleet state store sit
//! behind `parking_lot` locks that are never held across an `.await`, so
//! every mutation is complete before a task yields.

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
