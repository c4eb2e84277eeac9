// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Mecanum drive kinematics and motion classification.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ports::Wheel;

pub const DEFAULT_WHEEL_RADIUS: f64 = 0.05;

/// How the robot moves toward a target on this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionKind {
    Horizontal,
    Vertical,
    Diagonal,
}

impl MotionKind {
    /// Diagonal when both axes exceed `threshold`, otherwise the dominant axis.
    pub fn classify(dx: f64, dy: f64, threshold: f64) -> Self {
        if dx.abs() > threshold && dy.abs() > threshold {
            MotionKind::Diagonal
        } else if dx.abs() >= dy.abs() {
            MotionKind::Horizontal
        } else {
            MotionKind::Vertical
        }
    }

    /// World-frame velocity at `speed` per moving axis.
    pub fn velocity(self, dx: f64, dy: f64, speed: f64) -> (f64, f64) {
        let sign = |v: f64| if v == 0.0 { 0.0 } else { v.signum() };
        match self {
            MotionKind::Horizontal => (speed * sign(dx), 0.0),
            MotionKind::Vertical => (0.0, speed * sign(dy)),
            MotionKind::Diagonal => (speed * sign(dx), speed * sign(dy)),
        }
    }
}

impl fmt::Display for MotionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MotionKind::Horizontal => "Horizontal",
            MotionKind::Vertical => "Vertical",
            MotionKind::Diagonal => "Diagonal",
        };
        f.write_str(s)
    }
}

/// Rotates a world-frame velocity into the body frame.
pub fn world_to_body(vx: f64, vy: f64, yaw: f64) -> (f64, f64) {
    let (s, c) = yaw.sin_cos();
    (c * vx + s * vy, -s * vx + c * vy)
}

/// Rotates a body-frame velocity into the world frame.
pub fn body_to_world(vx: f64, vy: f64, yaw: f64) -> (f64, f64) {
    let (s, c) = yaw.sin_cos();
    (c * vx - s * vy, s * vx + c * vy)
}

/// Angular velocity per wheel, rad/s.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WheelSpeeds {
    pub front_left: f64,
    pub front_right: f64,
    pub rear_left: f64,
    pub rear_right: f64,
}

impl WheelSpeeds {
    pub fn get(&self, wheel: Wheel) -> f64 {
        match wheel {
            Wheel::FrontLeft => self.front_left,
            Wheel::FrontRight => self.front_right,
            Wheel::RearLeft => self.rear_left,
            Wheel::RearRight => self.rear_right,
        }
    }

    pub fn set(&mut self, wheel: Wheel, value: f64) {
        match wheel {
            Wheel::FrontLeft => self.front_left = value,
            Wheel::FrontRight => self.front_right = value,
            Wheel::RearLeft => self.rear_left = value,
            Wheel::RearRight => self.rear_right = value,
        }
    }

    pub fn is_stopped(&self) -> bool {
        Wheel::ALL.iter().all(|w| self.get(*w) == 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mecanum {
    pub wheel_radius: f64,
}

impl Default for Mecanum {
    fn default() -> Self {
        Self {
            wheel_radius: DEFAULT_WHEEL_RADIUS,
        }
    }
}

impl Mecanum {
    /// Body velocity to wheel speeds.
    pub fn wheel_speeds(&self, vx: f64, vy: f64) -> WheelSpeeds {
        let scale = 1.0 / self.wheel_radius;
        WheelSpeeds {
            front_left: (-vy - vx) * scale,
            front_right: (vy - vx) * scale,
            rear_left: (-vy + vx) * scale,
            rear_right: (vy + vx) * scale,
        }
    }

    /// Wheel speeds back to body velocity.
    pub fn body_velocity(&self, w: &WheelSpeeds) -> (f64, f64) {
        let r = self.wheel_radius;
        let vx = (-w.front_left - w.front_right + w.rear_left + w.rear_right) / 4.0 * r;
        let vy = (-w.front_left + w.front_right - w.rear_left + w.rear_right) / 4.0 * r;
        (vx, vy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motion_kind() {
        assert_eq!(MotionKind::classify(0.5, 0.3, 0.1), MotionKind::Diagonal);
        assert_eq!(MotionKind::classify(0.5, 0.05, 0.1), MotionKind::Horizontal);
        assert_eq!(MotionKind::classify(0.05, -0.5, 0.1), MotionKind::Vertical);
        assert_eq!(MotionKind::classify(0.0, 0.0, 0.1), MotionKind::Horizontal);
    }

    #[test]
    fn test_velocity_per_kind() {
        assert_eq!(MotionKind::Horizontal.velocity(-2.0, 1.0, 0.3), (-0.3, 0.0));
        assert_eq!(MotionKind::Vertical.velocity(2.0, -1.0, 0.3), (0.0, -0.3));
        assert_eq!(MotionKind::Diagonal.velocity(2.0, -1.0, 0.3), (0.3, -0.3));
    }

    #[test]
    fn test_mecanum_round_trip() {
        let drive = Mecanum::default();
        let speeds = drive.wheel_speeds(0.2, -0.1);
        assert!((speeds.front_left - (0.1 - 0.2) / 0.05).abs() < 1e-12);
        let (vx, vy) = drive.body_velocity(&speeds);
        assert!((vx - 0.2).abs() < 1e-12);
        assert!((vy + 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_frame_rotation() {
        let (bx, by) = world_to_body(1.0, 0.0, std::f64::consts::FRAC_PI_2);
        assert!(bx.abs() < 1e-12 && (by + 1.0).abs() < 1e-12);
        let (wx, wy) = body_to_world(bx, by, std::f64::consts::FRAC_PI_2);
        assert!((wx - 1.0).abs() < 1e-12 && wy.abs() < 1e-12);
    }
}
