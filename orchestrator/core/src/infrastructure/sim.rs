// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # In-process Kinematic Simulator
//!
//! Implements [`RobotPort`] and [`RobotConnector`] over a shared world of
//! mecanum robots and static obstacle points.
//!
//! - Virtual clock: every `position()` read advances that robot by one
//!   control period `dt` using its current wheel speeds.
//! - Range sensors return every obstacle point and every sampled robot body
//!   within `sensor_range`, as offsets from the robot in world axes. With two
//!   or more sensors the first covers the front half (`y <= 0`) and the
//!   others the back half.
//! - Scans travel through the base64 packet codec, as they do from a real
//!   driver.
//! - Robots listed as unreachable fail to connect.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::f64::consts::TAU;
use std::sync::Arc;

use crate::domain::fleet_config::SimulationConfig;
use crate::domain::geometry::Point2;
use crate::domain::kinematics::{body_to_world, Mecanum, WheelSpeeds};
use crate::domain::ports::{PortError, RobotConnector, RobotPort, SensorId, SensorPoint, Wheel};
use crate::domain::robot::{Orientation, RobotId};
use crate::infrastructure::scan_codec::{decode_packet, encode_packet};

/// Points sampled on the rim of each robot body.
const BODY_SAMPLES: usize = 8;

#[derive(Debug, Clone)]
pub struct SimSettings {
    pub dt: f64,
    pub sensor_range: f64,
    pub robot_radius: f64,
    pub drive: Mecanum,
    pub sensors: Vec<SensorId>,
}

impl Default for SimSettings {
    fn default() -> Self {
        let config = SimulationConfig::default();
        Self {
            dt: config.dt,
            sensor_range: config.sensor_range,
            robot_radius: config.robot_radius,
            drive: Mecanum::default(),
            sensors: vec![SensorId::new("S300"), SensorId::new("S3001")],
        }
    }
}

#[derive(Debug, Clone)]
struct SimRobot {
    position: Point2,
    orientation: Orientation,
    wheels: WheelSpeeds,
    steps: u64,
}

#[derive(Debug, Default)]
struct WorldState {
    robots: BTreeMap<RobotId, SimRobot>,
    obstacles: Vec<Point2>,
    unreachable: HashSet<RobotId>,
}

#[derive(Clone)]
pub struct SimWorld {
    state: Arc<Mutex<WorldState>>,
    settings: Arc<SimSettings>,
}

impl SimWorld {
    pub fn new(settings: SimSettings) -> Self {
        Self {
            state: Arc::new(Mutex::new(WorldState::default())),
            settings: Arc::new(settings),
        }
    }

    /// World from the `simulation` config section. Walls are sampled every
    /// `sample_step` meters.
    pub fn from_config(config: &SimulationConfig, sensors: Vec<SensorId>, sample_step: f64) -> Self {
        let world = Self::new(SimSettings {
            dt: config.dt,
            sensor_range: config.sensor_range,
            robot_radius: config.robot_radius,
            drive: Mecanum::default(),
            sensors,
        });
        for p in &config.obstacles {
            world.add_obstacle(Point2::from(*p));
        }
        for [x0, y0, x1, y1] in &config.walls {
            world.add_wall(Point2::new(*x0, *y0), Point2::new(*x1, *y1), sample_step);
        }
        for id in &config.unreachable {
            world.set_unreachable(RobotId::normalized(id));
        }
        world
    }

    pub fn settings(&self) -> &SimSettings {
        &self.settings
    }

    pub fn add_robot(&self, id: RobotId, at: Point2) {
        self.state.lock().robots.insert(
            id,
            SimRobot {
                position: at,
                orientation: Orientation::default(),
                wheels: WheelSpeeds::default(),
                steps: 0,
            },
        );
    }

    pub fn add_obstacle(&self, at: Point2) {
        self.state.lock().obstacles.push(at);
    }

    /// Straight run of obstacle points from `from` to `to` inclusive.
    pub fn add_wall(&self, from: Point2, to: Point2, step: f64) {
        let length = from.distance_to(to);
        let samples = if step > 0.0 { (length / step).ceil() as usize } else { 0 };
        let mut state = self.state.lock();
        for i in 0..=samples {
            let t = if samples == 0 { 0.0 } else { i as f64 / samples as f64 };
            state
                .obstacles
                .push(Point2::new(from.x + (to.x - from.x) * t, from.y + (to.y - from.y) * t));
        }
    }

    pub fn set_unreachable(&self, id: RobotId) {
        self.state.lock().unreachable.insert(id);
    }

    /// Current position without advancing the clock.
    pub fn peek_position(&self, id: &RobotId) -> Option<Point2> {
        self.state.lock().robots.get(id).map(|r| r.position)
    }

    pub fn wheel_speeds(&self, id: &RobotId) -> Option<WheelSpeeds> {
        self.state.lock().robots.get(id).map(|r| r.wheels)
    }

    /// Control periods integrated for `id` so far.
    pub fn steps(&self, id: &RobotId) -> u64 {
        self.state.lock().robots.get(id).map_or(0, |r| r.steps)
    }

    pub fn obstacle_count(&self) -> usize {
        self.state.lock().obstacles.len()
    }

    fn with_robot<T>(
        &self,
        id: &RobotId,
        f: impl FnOnce(&mut SimRobot) -> T,
    ) -> Result<T, PortError> {
        let mut state = self.state.lock();
        state.robots.get_mut(id).map(f).ok_or_else(|| PortError::Io {
            robot: id.clone(),
            reason: "robot is not in the simulated world".to_string(),
        })
    }

    fn advance(&self, id: &RobotId) -> Result<Point2, PortError> {
        let drive = self.settings.drive;
        let dt = self.settings.dt;
        self.with_robot(id, |robot| {
            let (bx, by) = drive.body_velocity(&robot.wheels);
            let (vx, vy) = body_to_world(bx, by, robot.orientation.yaw);
            robot.position = robot.position.offset(vx * dt, vy * dt);
            robot.steps += 1;
            robot.position
        })
    }

    fn scan(&self, id: &RobotId, sensor: &SensorId) -> Result<Vec<SensorPoint>, PortError> {
        let index = self
            .settings
            .sensors
            .iter()
            .position(|s| s == sensor)
            .ok_or_else(|| PortError::UnknownSensor {
                robot: id.clone(),
                sensor: sensor.clone(),
            })?;
        let covers = |dy: f64| match (self.settings.sensors.len(), index) {
            (1, _) => true,
            (_, 0) => dy <= 0.0,
            _ => dy > 0.0,
        };

        let state = self.state.lock();
        let me = state.robots.get(id).ok_or_else(|| PortError::Io {
            robot: id.clone(),
            reason: "robot is not in the simulated world".to_string(),
        })?;
        let origin = me.position;
        let radius = self.settings.robot_radius;

        let bodies = state
            .robots
            .iter()
            .filter(|(other, _)| *other != id)
            .flat_map(|(_, r)| {
                (0..BODY_SAMPLES).map(move |k| {
                    let a = TAU * k as f64 / BODY_SAMPLES as f64;
                    r.position.offset(radius * a.cos(), radius * a.sin())
                })
            });

        Ok(state
            .obstacles
            .iter()
            .copied()
            .chain(bodies)
            .map(|p| (p.x - origin.x, p.y - origin.y))
            .filter(|(dx, dy)| dx.hypot(*dy) <= self.settings.sensor_range && covers(*dy))
            .map(|(dx, dy)| SensorPoint::planar(dx, dy))
            .collect())
    }
}

#[async_trait]
impl RobotConnector for SimWorld {
    async fn connect(&self, robot: &RobotId) -> Result<Arc<dyn RobotPort>, PortError> {
        {
            let state = self.state.lock();
            if state.unreachable.contains(robot) {
                return Err(PortError::Connect {
                    robot: robot.clone(),
                    reason: "handle initialisation failed".to_string(),
                });
            }
            if !state.robots.contains_key(robot) {
                return Err(PortError::Connect {
                    robot: robot.clone(),
                    reason: "no such robot in the simulated world".to_string(),
                });
            }
        }
        Ok(Arc::new(SimPort {
            world: self.clone(),
            id: robot.clone(),
        }))
    }
}

pub struct SimPort {
    world: SimWorld,
    id: RobotId,
}

#[async_trait]
impl RobotPort for SimPort {
    fn robot_id(&self) -> &RobotId {
        &self.id
    }

    async fn position(&self) -> Result<Point2, PortError> {
        self.world.advance(&self.id)
    }

    async fn orientation(&self) -> Result<Orientation, PortError> {
        self.world.with_robot(&self.id, |r| r.orientation)
    }

    async fn set_orientation(&self, orientation: Orientation) -> Result<(), PortError> {
        self.world.with_robot(&self.id, |r| r.orientation = orientation)
    }

    async fn set_wheel_velocity(&self, wheel: Wheel, velocity: f64) -> Result<(), PortError> {
        self.world.with_robot(&self.id, |r| r.wheels.set(wheel, velocity))
    }

    async fn stop(&self) -> Result<(), PortError> {
        self.world.with_robot(&self.id, |r| r.wheels = WheelSpeeds::default())
    }

    async fn read_scan(&self, sensor: &SensorId) -> Result<Vec<SensorPoint>, PortError> {
        let points = self.world.scan(&self.id, sensor)?;
        decode_packet(&encode_packet(&points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rob(id: &str) -> RobotId {
        RobotId::new(id)
    }

    fn world() -> SimWorld {
        let world = SimWorld::new(SimSettings::default());
        world.add_robot(rob("Rob0"), Point2::new(0.0, 0.0));
        world
    }

    #[tokio::test]
    async fn test_wheels_integrate_on_position_read() {
        let world = world();
        let port = world.connect(&rob("Rob0")).await.unwrap();
        let speeds = world.settings().drive.wheel_speeds(0.3, 0.0);
        for wheel in Wheel::ALL {
            port.set_wheel_velocity(wheel, speeds.get(wheel)).await.unwrap();
        }
        let mut p = Point2::default();
        for _ in 0..10 {
            p = port.position().await.unwrap();
        }
        assert!((p.x - 0.15).abs() < 1e-9, "x = {}", p.x);
        assert!(p.y.abs() < 1e-12);
        assert_eq!(world.steps(&rob("Rob0")), 10);

        port.stop().await.unwrap();
        assert!(world.wheel_speeds(&rob("Rob0")).unwrap().is_stopped());
        let still = port.position().await.unwrap();
        assert_eq!(still, p);
    }

    #[tokio::test]
    async fn test_sensors_split_front_and_back() {
        let world = world();
        world.add_obstacle(Point2::new(0.0, -0.5));
        world.add_obstacle(Point2::new(0.0, 0.5));
        world.add_obstacle(Point2::new(9.0, 0.0));
        let port = world.connect(&rob("Rob0")).await.unwrap();

        let front = port.read_scan(&SensorId::new("S300")).await.unwrap();
        assert_eq!(front.len(), 1);
        assert!((front[0].y + 0.5).abs() < 1e-6);

        let back = port.read_scan(&SensorId::new("S3001")).await.unwrap();
        assert_eq!(back.len(), 1);
        assert!((back[0].range - 0.5).abs() < 1e-6);

        assert!(matches!(
            port.read_scan(&SensorId::new("lidar")).await,
            Err(PortError::UnknownSensor { .. })
        ));
    }

    #[tokio::test]
    async fn test_other_robots_are_visible() {
        let world = world();
        world.add_robot(rob("Rob1"), Point2::new(0.0, -0.7));
        let port = world.connect(&rob("Rob0")).await.unwrap();
        let front = port.read_scan(&SensorId::new("S300")).await.unwrap();
        assert!(!front.is_empty());
        let nearest = front.iter().map(|p| p.range).fold(f64::INFINITY, f64::min);
        assert!((nearest - 0.4).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_unreachable_robot_fails_to_connect() {
        let world = world();
        world.add_robot(rob("Rob1"), Point2::new(1.0, 0.0));
        world.set_unreachable(rob("Rob1"));
        assert!(matches!(
            world.connect(&rob("Rob1")).await,
            Err(PortError::Connect { .. })
        ));
        assert!(world.connect(&rob("Rob9")).await.is_err());
    }

    #[test]
    fn test_wall_sampling() {
        let world = world();
        world.add_wall(Point2::new(-1.0, 1.0), Point2::new(1.0, 1.0), 0.2);
        assert_eq!(world.obstacle_count(), 11);
    }
}
