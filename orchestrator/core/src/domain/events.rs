// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::geometry::Point2;
use crate::domain::mission::{MissionId, ReplanCause};
use crate::domain::robot::RobotId;
use crate::domain::sector::Sector;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MissionEvent {
    MissionStarted {
        mission_id: MissionId,
        robot: RobotId,
        goal: Point2,
        started_at: DateTime<Utc>,
    },
    PathPlanned {
        mission_id: MissionId,
        robot: RobotId,
        attempt: u32,
        waypoints: Vec<Point2>,
        cost: f64,
        planned_at: DateTime<Utc>,
    },
    WaypointReached {
        mission_id: MissionId,
        robot: RobotId,
        index: usize,
        waypoint: Point2,
        reached_at: DateTime<Utc>,
    },
    /// Executed pose, one per tick.
    TrajectorySample {
        mission_id: MissionId,
        robot: RobotId,
        position: Point2,
        sampled_at: DateTime<Utc>,
    },
    ReplanTriggered {
        mission_id: MissionId,
        robot: RobotId,
        cause: ReplanCause,
        triggered_at: DateTime<Utc>,
    },
    ObstaclePaused {
        mission_id: MissionId,
        robot: RobotId,
        sector: Sector,
        paused_at: DateTime<Utc>,
    },
    MissionCompleted {
        mission_id: MissionId,
        robot: RobotId,
        replans: u32,
        elapsed_secs: f64,
        /// Nearest-point RMSE of the executed trajectory against the last plan.
        tracking_rmse: Option<f64>,
        completed_at: DateTime<Utc>,
    },
    MissionFailed {
        mission_id: MissionId,
        robot: RobotId,
        reason: String,
        replans: u32,
        elapsed_secs: f64,
        failed_at: DateTime<Utc>,
    },
}

impl MissionEvent {
    pub fn robot(&self) -> &RobotId {
        match self {
            MissionEvent::MissionStarted { robot, .. }
            | MissionEvent::PathPlanned { robot, .. }
            | MissionEvent::WaypointReached { robot, .. }
            | MissionEvent::TrajectorySample { robot, .. }
            | MissionEvent::ReplanTriggered { robot, .. }
            | MissionEvent::ObstaclePaused { robot, .. }
            | MissionEvent::MissionCompleted { robot, .. }
            | MissionEvent::MissionFailed { robot, .. } => robot,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ParkingEvent {
    RobotParked {
        robot: RobotId,
        requested_by: RobotId,
        direction: Sector,
        home: Point2,
        park: Point2,
        parked_at: DateTime<Utc>,
    },
    ParkingFailed {
        robot: RobotId,
        requested_by: RobotId,
        cause: Sector,
        failed_at: DateTime<Utc>,
    },
    RobotReturned {
        robot: RobotId,
        home: Point2,
        returned_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MapEvent {
    MapGrown {
        old_size: usize,
        new_size: usize,
        grown_at: DateTime<Utc>,
    },
    MapSaved {
        path: String,
        rebuilds: u64,
        saved_at: DateTime<Utc>,
    },
}
