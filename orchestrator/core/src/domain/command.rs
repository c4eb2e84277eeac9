// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Decoded operator intents and the replies the supervisor sends back.
//!
//! Commands arrive as tagged JSON:
//!
//! ```json
//! {"type": "move", "robot_id": "Robot1", "destination": "point a"}
//! {"type": "move", "destination": [1.5, 3.0]}
//! {"type": "obstacle_action", "robot_id": "Rob0", "action": "continue"}
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::geometry::Point2;
use super::mission::MissionId;
use super::ports::PortError;
use super::robot::{RobotId, RobotStatus};

/// Where to go: coordinates or a named location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Destination {
    Pair([f64; 2]),
    Point { x: f64, y: f64 },
    Label(String),
}

impl Destination {
    /// Coordinates when given directly, `None` for a label.
    pub fn coordinates(&self) -> Option<Point2> {
        match self {
            Destination::Pair(p) => Some(Point2::from(*p)),
            Destination::Point { x, y } => Some(Point2::new(*x, *y)),
            Destination::Label(_) => None,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Label(label) => f.write_str(label),
            other => match other.coordinates() {
                Some(p) => write!(f, "{p}"),
                None => Ok(()),
            },
        }
    }
}

/// Operator decision for a robot paused at a static obstacle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleAction {
    Wait,
    Continue,
    Stop,
    GoHome,
    SetGoal,
}

impl FromStr for ObstacleAction {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wait" => Ok(Self::Wait),
            "continue" => Ok(Self::Continue),
            "stop" => Ok(Self::Stop),
            "go_home" => Ok(Self::GoHome),
            "set_goal" => Ok(Self::SetGoal),
            other => Err(CommandError::Malformed(format!("unknown obstacle action '{other}'"))),
        }
    }
}

impl fmt::Display for ObstacleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Wait => "wait",
            Self::Continue => "continue",
            Self::Stop => "stop",
            Self::GoHome => "go_home",
            Self::SetGoal => "set_goal",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Move {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        robot_id: Option<String>,
        destination: Destination,
    },
    Status {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        robot_id: Option<String>,
    },
    Position {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        robot_id: Option<String>,
    },
    Stop {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        robot_id: Option<String>,
    },
    GoHome {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        robot_id: Option<String>,
    },
    NearestToLocation {
        location: Destination,
    },
    ObstacleAction {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        robot_id: Option<String>,
        action: ObstacleAction,
        /// New goal for `set_goal`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        destination: Option<Destination>,
    },
}

/// Which robot a command addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RobotSelector {
    /// No id, `auto`, or `nearest robot`.
    Auto,
    Id(RobotId),
}

impl RobotSelector {
    pub fn from_optional(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => Self::Auto,
            Some(s) if s.eq_ignore_ascii_case("auto") || s.eq_ignore_ascii_case("nearest robot") => {
                Self::Auto
            }
            Some(s) => Self::Id(RobotId::normalized(s)),
        }
    }
}

impl Command {
    /// Parses one JSON line.
    pub fn parse_json(line: &str) -> Result<Self, CommandError> {
        serde_json::from_str(line.trim()).map_err(|e| CommandError::Malformed(e.to_string()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Command::Move { .. } => "move",
            Command::Status { .. } => "status",
            Command::Position { .. } => "position",
            Command::Stop { .. } => "stop",
            Command::GoHome { .. } => "go_home",
            Command::NearestToLocation { .. } => "nearest_to_location",
            Command::ObstacleAction { .. } => "obstacle_action",
        }
    }

    pub fn selector(&self) -> RobotSelector {
        match self {
            Command::Move { robot_id, .. }
            | Command::Status { robot_id }
            | Command::Position { robot_id }
            | Command::Stop { robot_id }
            | Command::GoHome { robot_id }
            | Command::ObstacleAction { robot_id, .. } => {
                RobotSelector::from_optional(robot_id.as_deref())
            }
            Command::NearestToLocation { .. } => RobotSelector::Auto,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CommandError {
    #[error("malformed command: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    #[error("no idle robot available")]
    NoIdleRobot,

    #[error("robot {0} is busy")]
    RobotBusy(RobotId),

    #[error("unknown robot {0}")]
    UnknownRobot(RobotId),

    #[error("unknown location '{0}'")]
    UnknownLocation(String),

    #[error("robot {0} is not paused at an obstacle")]
    NotPaused(RobotId),

    #[error("no robot is paused at an obstacle")]
    NothingPaused,

    #[error("several robots are paused; name one")]
    AmbiguousPause,

    #[error("set_goal needs a destination")]
    MissingDestination,

    #[error(transparent)]
    Port(#[from] PortError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotStatusView {
    pub robot: RobotId,
    pub status: RobotStatus,
    pub goal: Option<Point2>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotPositionView {
    pub robot: RobotId,
    pub position: Point2,
}

/// Reply to exactly one command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum CommandReply {
    Dispatched {
        robot: RobotId,
        mission_id: MissionId,
        goal: Point2,
    },
    Status {
        robots: Vec<RobotStatusView>,
    },
    Position {
        robots: Vec<RobotPositionView>,
    },
    Nearest {
        robot: RobotId,
        location: Point2,
        distance: f64,
    },
    Stopping {
        robots: Vec<RobotId>,
    },
    GoingHome {
        robots: Vec<RobotId>,
    },
    ObstacleActionAccepted {
        robot: RobotId,
        action: ObstacleAction,
    },
    Error {
        command: String,
        message: String,
    },
}

impl CommandReply {
    pub fn error(command: &str, message: impl fmt::Display) -> Self {
        Self::Error {
            command: command.to_string(),
            message: message.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}
