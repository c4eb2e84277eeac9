// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Missions: one goal-to-completion task for a single robot.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use super::geometry::Point2;
use super::planner::PlanningError;
use super::ports::PortError;
use super::robot::RobotId;
use super::sector::Sector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MissionId(pub Uuid);

impl MissionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A mission request handed to an executor task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    pub id: MissionId,
    pub robot: RobotId,
    pub goal: Point2,
}

impl Mission {
    pub fn new(robot: RobotId, goal: Point2) -> Self {
        Self {
            id: MissionId::new(),
            robot,
            goal,
        }
    }
}

/// Executor state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutorState {
    Approaching,
    BlockedByRobot,
    BlockedByStaticPaused,
    Replanning,
    Done,
    Failed,
}

impl ExecutorState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutorState::Done | ExecutorState::Failed)
    }
}

/// Why the executor left `Approaching` for `Replanning`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum ReplanCause {
    /// The target waypoint's cell became impassable since planning.
    BlockedWaypoint,
    /// No parking candidate cleared the blocking robot.
    ConflictUnresolved { blocker: RobotId },
    /// A static obstacle stayed after the detour, or the operator redirected.
    StaticObstacle { sector: Sector },
    OperatorRedirect,
}

/// Terminal mission failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MissionFailure {
    #[error("planning failed: {0}")]
    PlanningFailed(#[from] PlanningError),

    #[error("planning task did not complete: {0}")]
    PlanningTask(String),

    #[error("replan limit of {limit} exceeded")]
    ReplanLimitExceeded { limit: u32 },

    #[error("abort requested")]
    AbortRequested,

    #[error("stopped by operator at {sector} obstacle")]
    OperatorStopped { sector: Sector },

    #[error("port failure: {0}")]
    Port(#[from] PortError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionState {
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionOutcome {
    pub mission_id: MissionId,
    pub robot: RobotId,
    pub state: MissionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub replans: u32,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl MissionOutcome {
    pub fn is_done(&self) -> bool {
        self.state == MissionState::Done
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}
