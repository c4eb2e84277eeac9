// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Robot identity and per-robot fleet state.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::geometry::Point2;

/// Robot identifier, e.g. `Rob0`.
///
/// Parsing accepts the long spelling `Robot0` and normalises it to `Rob0`,
/// which is how intent parsers tend to emit names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RobotId(String);

impl RobotId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Trims, and rewrites a leading `Robot` (any case) to `Rob`.
    pub fn normalized(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("robot") && trimmed.len() > 5 {
            return Self(format!("Rob{}", &trimmed[5..]));
        }
        if lower.starts_with("rob") && trimmed.len() > 3 {
            return Self(format!("Rob{}", &trimmed[3..]));
        }
        Self(trimmed.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RobotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RobotId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotStatus {
    #[default]
    Idle,
    Busy,
}

impl fmt::Display for RobotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RobotStatus::Idle => f.write_str("idle"),
            RobotStatus::Busy => f.write_str("busy"),
        }
    }
}

/// Roll, pitch, yaw in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Orientation {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl Orientation {
    pub const fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }
}

/// Live state of one robot, owned by the fleet state store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotState {
    pub id: RobotId,
    pub position: Point2,
    pub orientation: Orientation,
    pub status: RobotStatus,
    /// Pose at fleet start; target of `go_home`.
    pub home: Point2,
    pub goal: Option<Point2>,
    /// Observed by the executor on its next tick.
    pub abort: bool,
    /// Mission to launch once the robot is idle again.
    pub pending_goal: Option<Point2>,
}

impl RobotState {
    pub fn new(id: RobotId, position: Point2) -> Self {
        Self {
            id,
            position,
            orientation: Orientation::default(),
            status: RobotStatus::Idle,
            home: position,
            goal: None,
            abort: false,
            pending_goal: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == RobotStatus::Idle
    }
}
