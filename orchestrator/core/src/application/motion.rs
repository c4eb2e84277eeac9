// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! World-frame motion commands turned into wheel velocities.

use std::sync::Arc;

use crate::domain::geometry::Point2;
use crate::domain::kinematics::{world_to_body, Mecanum, MotionKind};
use crate::domain::ports::{PortError, RobotPort, Wheel};

pub struct MotionDriver {
    port: Arc<dyn RobotPort>,
    drive: Mecanum,
    speed: f64,
}

impl MotionDriver {
    pub fn new(port: Arc<dyn RobotPort>, speed: f64) -> Self {
        Self {
            port,
            drive: Mecanum::default(),
            speed,
        }
    }

    pub fn port(&self) -> &Arc<dyn RobotPort> {
        &self.port
    }

    /// Commands one tick of motion along `(dx, dy)`. Returns the world
    /// velocity sent.
    pub async fn drive(&self, dx: f64, dy: f64, kind: MotionKind, yaw: f64) -> Result<(f64, f64), PortError> {
        let (vx, vy) = kind.velocity(dx, dy, self.speed);
        let (bx, by) = world_to_body(vx, vy, yaw);
        let speeds = self.drive.wheel_speeds(bx, by);
        for wheel in Wheel::ALL {
            self.port.set_wheel_velocity(wheel, speeds.get(wheel)).await?;
        }
        Ok((vx, vy))
    }

    /// Drives toward `target`, diagonally when both axes exceed
    /// `diagonal_threshold`.
    pub async fn step_toward(&self, from: Point2, target: Point2, diagonal_threshold: f64, yaw: f64) -> Result<MotionKind, PortError> {
        let (dx, dy) = (target.x - from.x, target.y - from.y);
        let kind = MotionKind::classify(dx, dy, diagonal_threshold);
        self.drive(dx, dy, kind, yaw).await?;
        Ok(kind)
    }

    pub async fn stop(&self) -> Result<(), PortError> {
        self.port.stop().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::robot::RobotId;
    use crate::infrastructure::sim::{SimSettings, SimWorld};
    use crate::domain::ports::RobotConnector;

    async fn driver() -> (MotionDriver, SimWorld) {
        let world = SimWorld::new(SimSettings::default());
        world.add_robot(RobotId::new("Rob0"), Point2::default());
        let port = world.connect(&RobotId::new("Rob0")).await.unwrap();
        (MotionDriver::new(port, 0.3), world)
    }

    #[tokio::test]
    async fn test_diagonal_moves_both_axes() {
        let (driver, _world) = driver().await;
        let kind = driver
            .step_toward(Point2::default(), Point2::new(1.0, -1.0), 0.05, 0.0)
            .await
            .unwrap();
        assert_eq!(kind, MotionKind::Diagonal);
        let p = driver.port().position().await.unwrap();
        assert!(p.x > 0.0 && p.y < 0.0, "moved to {p}");
        assert!((p.x + p.y).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_small_axis_is_dropped() {
        let (driver, _world) = driver().await;
        let kind = driver
            .step_toward(Point2::default(), Point2::new(0.02, 1.0), 0.05, 0.0)
            .await
            .unwrap();
        assert_eq!(kind, MotionKind::Vertical);
        let p = driver.port().position().await.unwrap();
        assert!(p.x.abs() < 1e-9);
        assert!(p.y > 0.0);
    }

    #[tokio::test]
    async fn test_stop_zeroes_wheels() {
        let (driver, world) = driver().await;
        driver.drive(1.0, 0.0, MotionKind::Horizontal, 0.0).await.unwrap();
        assert!(!world.wheel_speeds(&RobotId::new("Rob0")).unwrap().is_stopped());
        driver.stop().await.unwrap();
        assert!(world.wheel_speeds(&RobotId::new("Rob0")).unwrap().is_stopped());
    }
}
