// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Actuation and sensing ports.
//!
//! The core only talks to robots through [`RobotPort`]. A simulator or a real
//! driver that satisfies the contract is interchangeable; see
//! [`crate::infrastructure::sim`] for the in-process implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::geometry::Point2;
use super::robot::{Orientation, RobotId};

/// One range-sensor return in the robot's own frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub range: f64,
}

impl SensorPoint {
    pub const fn new(x: f64, y: f64, z: f64, range: f64) -> Self {
        Self { x, y, z, range }
    }

    /// Point whose range is the planar distance.
    pub fn planar(x: f64, y: f64) -> Self {
        Self::new(x, y, 0.0, x.hypot(y))
    }

    /// Reported range, or the planar distance when missing or non-finite.
    pub fn effective_range(&self) -> f64 {
        if self.range.is_finite() && self.range > 0.0 {
            self.range
        } else {
            self.x.hypot(self.y)
        }
    }
}

/// Name of a range sensor mounted on a robot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorId(pub String);

impl SensorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Wheel {
    FrontLeft,
    FrontRight,
    RearLeft,
    RearRight,
}

impl Wheel {
    pub const ALL: [Wheel; 4] = [
        Wheel::FrontLeft,
        Wheel::FrontRight,
        Wheel::RearLeft,
        Wheel::RearRight,
    ];
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PortError {
    #[error("failed to initialise handles for {robot}: {reason}")]
    Connect { robot: RobotId, reason: String },

    #[error("robot {robot} did not respond: {reason}")]
    Io { robot: RobotId, reason: String },

    #[error("unknown sensor {sensor} on {robot}")]
    UnknownSensor { robot: RobotId, sensor: SensorId },

    #[error("malformed scan packet: {0}")]
    Packet(String),
}

/// Per-robot actuation and sensing contract. Every call is a suspension
/// point of the mission task.
#[async_trait]
pub trait RobotPort: Send + Sync {
    fn robot_id(&self) -> &RobotId;

    async fn position(&self) -> Result<Point2, PortError>;

    async fn orientation(&self) -> Result<Orientation, PortError>;

    /// Holds a fixed reference attitude.
    async fn set_orientation(&self, orientation: Orientation) -> Result<(), PortError>;

    /// Target angular velocity of one wheel, rad/s.
    async fn set_wheel_velocity(&self, wheel: Wheel, velocity: f64) -> Result<(), PortError>;

    async fn stop(&self) -> Result<(), PortError>;

    async fn read_scan(&self, sensor: &SensorId) -> Result<Vec<SensorPoint>, PortError>;
}

/// Resolves robot ids to live ports. Handle initialisation may fail per
/// robot; such robots are skipped for the current dispatch only.
#[async_trait]
pub trait RobotConnector: Send + Sync {
    async fn connect(&self, robot: &RobotId) -> Result<Arc<dyn RobotPort>, PortError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_range_falls_back_to_planar() {
        assert_eq!(SensorPoint::new(0.3, 0.4, 0.0, 2.0).effective_range(), 2.0);
        assert!((SensorPoint::new(0.3, 0.4, 0.0, f64::NAN).effective_range() - 0.5).abs() < 1e-12);
        assert!((SensorPoint::new(0.3, 0.4, 0.0, 0.0).effective_range() - 0.5).abs() < 1e-12);
    }
}
