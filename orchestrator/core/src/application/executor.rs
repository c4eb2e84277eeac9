// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Path Executor
//!
//! Drives one robot from its current pose to the mission goal.
//!
//! ```text
//!              ┌──────── robot ahead ───────► BlockedByRobot ──parked──┐
//!              │                                   │ refused           │
//! Approaching ─┼──── static obstacle ─► BlockedByStaticPaused ─────────┤
//!      ▲       │                                   │ redirect / detour │
//!      │       └──── waypoint blocked ─────────────┴──► Replanning ────┘
//!      └───────────────── new plan ◄────────────────────────┘
//! ```
//!
//! Each tick observes the pose, folds the latest scan into the shared map,
//! re-checks the target waypoint against the live cost layer, then either
//! asks the resolver to move a blocking robot, pauses for an operator
//! decision, or commands the wheels. Plans are attempted at most
//! `max_replans` times.

use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::application::context::FleetContext;
use crate::application::motion::MotionDriver;
use crate::application::planning::PlanningService;
use crate::application::resolver::{ConflictResolver, ResolverError};
use crate::domain::classifier::SectorSummary;
use crate::domain::command::ObstacleAction;
use crate::domain::events::MissionEvent;
use crate::domain::geometry::Point2;
use crate::domain::kinematics::MotionKind;
use crate::domain::mission::{
    ExecutorState, Mission, MissionFailure, MissionOutcome, MissionState, ReplanCause,
};
use crate::domain::planner::PlannedPath;
use crate::domain::ports::RobotPort;
use crate::domain::sector::{Sector, Slot};

enum Tick {
    Moving,
    Reached,
    Replan(ReplanCause),
}

enum PauseExit {
    Cleared,
    Continue,
    Redirect(Point2),
}

pub struct PathExecutor {
    ctx: FleetContext,
    mission: Mission,
    port: Arc<dyn RobotPort>,
    driver: MotionDriver,
    planning: PlanningService,
    resolver: ConflictResolver,
    state: ExecutorState,
    goal: Point2,
    replans: u32,
    trajectory: Vec<Point2>,
    last_plan: Vec<Point2>,
}

impl PathExecutor {
    pub fn new(ctx: FleetContext, mission: Mission, port: Arc<dyn RobotPort>) -> Self {
        let driver = MotionDriver::new(port.clone(), ctx.config.executor.speed);
        Self {
            planning: PlanningService::new(ctx.clone()),
            resolver: ConflictResolver::new(ctx.clone()),
            goal: mission.goal,
            ctx,
            mission,
            port,
            driver,
            state: ExecutorState::Approaching,
            replans: 0,
            trajectory: Vec::new(),
            last_plan: Vec::new(),
        }
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    /// Runs the mission to completion. The robot is stopped and marked idle
    /// whatever the outcome.
    pub async fn run(mut self) -> MissionOutcome {
        let started = Instant::now();
        let robot = self.mission.robot.clone();
        info!(robot = %robot, mission_id = %self.mission.id, goal = %self.goal, "Mission started");
        metrics::counter!("fleet_missions_started_total").increment(1);
        self.ctx.events.publish_mission_event(MissionEvent::MissionStarted {
            mission_id: self.mission.id,
            robot: robot.clone(),
            goal: self.goal,
            started_at: Utc::now(),
        });

        let result = self.drive_mission().await;
        if let Err(e) = self.driver.stop().await {
            warn!(robot = %robot, error = %e, "Failed to stop robot at mission end");
        }
        self.ctx.decisions.cancel(&robot).await;
        let elapsed = started.elapsed();

        let outcome = match result {
            Ok(()) => {
                self.set_state(ExecutorState::Done);
                let rmse = tracking_rmse(&self.last_plan, &self.trajectory);
                self.resolver.return_parked(&robot).await;
                info!(robot = %robot, replans = self.replans, elapsed_secs = elapsed.as_secs_f64(), "Mission completed");
                metrics::counter!("fleet_missions_completed_total").increment(1);
                self.ctx.events.publish_mission_event(MissionEvent::MissionCompleted {
                    mission_id: self.mission.id,
                    robot: robot.clone(),
                    replans: self.replans,
                    elapsed_secs: elapsed.as_secs_f64(),
                    tracking_rmse: rmse,
                    completed_at: Utc::now(),
                });
                MissionOutcome {
                    mission_id: self.mission.id,
                    robot: robot.clone(),
                    state: MissionState::Done,
                    reason: None,
                    replans: self.replans,
                    elapsed,
                }
            }
            Err(failure) => {
                self.set_state(ExecutorState::Failed);
                warn!(robot = %robot, reason = %failure, replans = self.replans, "Mission failed");
                metrics::counter!("fleet_missions_failed_total").increment(1);
                self.ctx.events.publish_mission_event(MissionEvent::MissionFailed {
                    mission_id: self.mission.id,
                    robot: robot.clone(),
                    reason: failure.to_string(),
                    replans: self.replans,
                    elapsed_secs: elapsed.as_secs_f64(),
                    failed_at: Utc::now(),
                });
                MissionOutcome {
                    mission_id: self.mission.id,
                    robot: robot.clone(),
                    state: MissionState::Failed,
                    reason: Some(failure.to_string()),
                    replans: self.replans,
                    elapsed,
                }
            }
        };
        self.ctx.store.mark_idle(&robot);
        outcome
    }

    async fn drive_mission(&mut self) -> Result<(), MissionFailure> {
        let limit = self.ctx.config.executor.max_replans;
        for attempt in 1..=limit {
            self.check_abort().await?;
            let (start, _) = self.observe().await?;
            let path = self.planning.plan(&self.mission.robot, start, self.goal).await?;
            self.ctx.events.publish_mission_event(MissionEvent::PathPlanned {
                mission_id: self.mission.id,
                robot: self.mission.robot.clone(),
                attempt,
                waypoints: path.waypoints.clone(),
                cost: path.cost,
                planned_at: Utc::now(),
            });
            self.last_plan = path.waypoints.clone();
            self.set_state(ExecutorState::Approaching);

            match self.follow(&path).await? {
                None => return Ok(()),
                Some(cause) => {
                    self.driver.stop().await?;
                    self.replans += 1;
                    self.set_state(ExecutorState::Replanning);
                    info!(robot = %self.mission.robot, ?cause, attempt, "Replanning");
                    metrics::counter!("fleet_replans_total").increment(1);
                    self.ctx.events.publish_mission_event(MissionEvent::ReplanTriggered {
                        mission_id: self.mission.id,
                        robot: self.mission.robot.clone(),
                        cause,
                        triggered_at: Utc::now(),
                    });
                }
            }
        }
        Err(MissionFailure::ReplanLimitExceeded { limit })
    }

    /// Follows the waypoints after the start cell; the last one is the exact
    /// goal. `Some(cause)` asks for a new plan.
    async fn follow(&mut self, path: &PlannedPath) -> Result<Option<ReplanCause>, MissionFailure> {
        let mut targets: Vec<Point2> = path.waypoints.iter().skip(1).copied().collect();
        match targets.last_mut() {
            Some(last) => *last = self.goal,
            None => targets.push(self.goal),
        }

        for (index, target) in targets.into_iter().enumerate() {
            loop {
                match self.tick(target).await? {
                    Tick::Moving => {}
                    Tick::Reached => break,
                    Tick::Replan(cause) => return Ok(Some(cause)),
                }
            }
            debug!(robot = %self.mission.robot, index, waypoint = %target, "Waypoint reached");
            self.ctx.events.publish_mission_event(MissionEvent::WaypointReached {
                mission_id: self.mission.id,
                robot: self.mission.robot.clone(),
                index,
                waypoint: target,
                reached_at: Utc::now(),
            });
        }
        Ok(None)
    }

    async fn tick(&mut self, target: Point2) -> Result<Tick, MissionFailure> {
        let config = self.ctx.config.clone();
        let exec = &config.executor;
        let robot = self.mission.robot.clone();

        self.check_abort().await?;
        let (cur, yaw) = self.observe().await?;
        let points = self.ctx.sense(self.port.as_ref()).await?;
        self.ctx.fold_scan(&robot, cur, &points);

        if self.waypoint_blocked(target) {
            debug!(robot = %robot, waypoint = %target, "Waypoint cell became impassable");
            return Ok(Tick::Replan(ReplanCause::BlockedWaypoint));
        }

        let (dx, dy) = self.deltas(cur, target);
        if dx == 0.0 && dy == 0.0 {
            self.driver.stop().await?;
            return Ok(Tick::Reached);
        }
        let kind = MotionKind::classify(dx, dy, exec.align_tolerance);
        let summary = self.ctx.classify(&robot, cur, &points);

        if let Some(hit) = summary.nearest_robot.clone() {
            self.driver.stop().await?;
            self.set_state(ExecutorState::BlockedByRobot);
            let side = conflict_side(hit.sector, dx, dy);
            info!(robot = %robot, blocker = %hit.robot, seen = %hit.sector, %side, "Robot in the way; requesting it to clear");
            let cleared = self.resolver.request_clear(&robot, &hit.robot, side).await;
            return match cleared {
                Ok(spot) => {
                    debug!(robot = %robot, blocker = %hit.robot, park = %spot.target, "Path cleared");
                    self.set_state(ExecutorState::Approaching);
                    Ok(Tick::Moving)
                }
                Err(ResolverError::Aborted(_)) => {
                    self.ctx.store.take_abort(&robot);
                    info!(robot = %robot, "Abort requested while waiting for the path to clear");
                    Err(MissionFailure::AbortRequested)
                }
                Err(e) => {
                    warn!(robot = %robot, blocker = %hit.robot, error = %e, "Conflict unresolved");
                    Ok(Tick::Replan(ReplanCause::ConflictUnresolved { blocker: hit.robot }))
                }
            };
        }

        if let Some(sector) = summary.blocking_sector_for(dx, dy) {
            self.driver.stop().await?;
            return self.handle_static(sector, target).await;
        }

        self.driver.drive(dx, dy, kind, yaw).await?;
        tokio::time::sleep(exec.tick_interval()).await;
        Ok(Tick::Moving)
    }

    async fn handle_static(&mut self, sector: Sector, target: Point2) -> Result<Tick, MissionFailure> {
        let robot = self.mission.robot.clone();
        self.set_state(ExecutorState::BlockedByStaticPaused);
        info!(robot = %robot, %sector, "Paused at static obstacle; waiting for operator");
        metrics::counter!("fleet_obstacle_pauses_total").increment(1);
        self.ctx.events.publish_mission_event(MissionEvent::ObstaclePaused {
            mission_id: self.mission.id,
            robot: robot.clone(),
            sector,
            paused_at: Utc::now(),
        });

        match self.await_decision(sector).await? {
            PauseExit::Redirect(goal) => {
                info!(robot = %robot, %goal, "Mission redirected by operator");
                self.goal = goal;
                self.ctx.store.set_goal(&robot, goal);
                return Ok(Tick::Replan(ReplanCause::OperatorRedirect));
            }
            PauseExit::Cleared => debug!(robot = %robot, %sector, "Obstacle cleared while paused"),
            PauseExit::Continue => debug!(robot = %robot, %sector, "Operator asked to continue"),
        }
        self.set_state(ExecutorState::Approaching);

        let (cur, _) = self.observe().await?;
        let points = self.ctx.sense(self.port.as_ref()).await?;
        let summary = self.ctx.classify(&robot, cur, &points);
        let (dx, dy) = self.deltas(cur, target);
        match summary.blocking_sector_for(dx, dy) {
            None => Ok(Tick::Moving),
            Some(blocking) => {
                self.detour(blocking, target).await?;
                Ok(Tick::Replan(ReplanCause::StaticObstacle { sector: blocking }))
            }
        }
    }

    /// Polls for the obstacle to clear or for an operator decision.
    async fn await_decision(&mut self, sector: Sector) -> Result<PauseExit, MissionFailure> {
        let robot = self.mission.robot.clone();
        let poll = self.ctx.config.executor.obstacle_poll();
        let mut ticket = self.ctx.decisions.register(&robot, sector).await;

        loop {
            if self.ctx.store.take_abort(&robot) {
                self.ctx.decisions.cancel(&robot).await;
                return Err(MissionFailure::AbortRequested);
            }
            let (cur, _) = self.observe().await?;
            let points = self.ctx.sense(self.port.as_ref()).await?;
            if !self.ctx.classify(&robot, cur, &points).seen.contains(sector) {
                self.ctx.decisions.cancel(&robot).await;
                return Ok(PauseExit::Cleared);
            }

            if let Some(decision) = ticket.poll() {
                match (decision.action, decision.goal) {
                    (ObstacleAction::Continue, _) => return Ok(PauseExit::Continue),
                    (ObstacleAction::Stop, _) => return Err(MissionFailure::OperatorStopped { sector }),
                    (ObstacleAction::GoHome | ObstacleAction::SetGoal, Some(goal)) => {
                        return Ok(PauseExit::Redirect(goal))
                    }
                    (ObstacleAction::GoHome | ObstacleAction::SetGoal, None) => {
                        warn!(robot = %robot, action = %decision.action, "Redirect without a goal; still waiting");
                        ticket = self.ctx.decisions.register(&robot, sector).await;
                    }
                    (ObstacleAction::Wait, _) => {
                        ticket = self.ctx.decisions.register(&robot, sector).await;
                    }
                }
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Slides along the free axis toward `target` until `direction` clears.
    /// A sideways slide runs to its end point. Bounded by `detour_max_ticks`.
    async fn detour(&mut self, direction: Sector, target: Point2) -> Result<(), MissionFailure> {
        let config = self.ctx.config.clone();
        let exec = &config.executor;
        let robot = self.mission.robot.clone();

        let (cur, _) = self.observe().await?;
        let points = self.ctx.sense(self.port.as_ref()).await?;
        let summary = self.ctx.classify(&robot, cur, &points);
        let reach = config.classifier.thresholds.range_threshold + self.ctx.geometry().resolution();
        let Some(slide) = plan_slide(direction, cur, target, exec.goal_tolerance, reach, &summary) else {
            warn!(robot = %robot, %direction, "No free side to detour along");
            return Ok(());
        };
        let mut temp = slide.goal;
        info!(robot = %robot, %direction, temp_goal = %temp, sideways = slide.sideways, "Detouring around static obstacle");

        for _ in 0..exec.detour_max_ticks {
            self.check_abort().await?;
            let (cur, yaw) = self.observe().await?;
            let points = self.ctx.sense(self.port.as_ref()).await?;
            let summary = self.ctx.classify(&robot, cur, &points);

            if !slide.sideways
                && direction.is_diagonal()
                && (summary.seen.contains(Sector::Left) || summary.seen.contains(Sector::Right))
            {
                temp = Point2::new(cur.x, target.y);
            }
            let robot_there = summary
                .nearest_robot
                .as_ref()
                .is_some_and(|hit| hit.sector == direction);
            let cleared = !summary.seen.contains(direction) && !robot_there;
            let (dx, dy) = self.deltas(cur, temp);
            let arrived = dx == 0.0 && dy == 0.0;

            if cleared && (arrived || !slide.sideways) {
                self.driver.stop().await?;
                info!(robot = %robot, %direction, at = %cur, "Detour cleared the obstacle");
                return Ok(());
            }
            if arrived {
                self.driver.stop().await?;
            } else {
                let kind = MotionKind::classify(dx, dy, exec.align_tolerance);
                self.driver.drive(dx, dy, kind, yaw).await?;
            }
            tokio::time::sleep(exec.tick_interval()).await;
        }

        self.driver.stop().await?;
        warn!(robot = %robot, %direction, "Detour did not clear the obstacle");
        Ok(())
    }

    async fn check_abort(&mut self) -> Result<(), MissionFailure> {
        if self.ctx.store.take_abort(&self.mission.robot) {
            self.driver.stop().await?;
            info!(robot = %self.mission.robot, "Abort requested");
            return Err(MissionFailure::AbortRequested);
        }
        Ok(())
    }

    /// Holds the reference attitude, reads the pose once, records it.
    async fn observe(&mut self) -> Result<(Point2, f64), MissionFailure> {
        self.port
            .set_orientation(self.ctx.config.executor.reference_orientation)
            .await?;
        let position = self.port.position().await?;
        let orientation = self.port.orientation().await?;
        self.ctx.store.update_pose(&self.mission.robot, position, orientation);
        self.trajectory.push(position);
        self.ctx.events.publish_mission_event(MissionEvent::TrajectorySample {
            mission_id: self.mission.id,
            robot: self.mission.robot.clone(),
            position,
            sampled_at: Utc::now(),
        });
        Ok((position, orientation.yaw))
    }

    /// Offsets to `target` with axes inside the goal tolerance zeroed.
    fn deltas(&self, cur: Point2, target: Point2) -> (f64, f64) {
        let tolerance = self.ctx.config.executor.goal_tolerance;
        let snap = |d: f64| if d.abs() < tolerance { 0.0 } else { d };
        (snap(target.x - cur.x), snap(target.y - cur.y))
    }

    fn waypoint_blocked(&self, target: Point2) -> bool {
        let threshold = self.ctx.config.planner.block_threshold;
        self.ctx
            .map
            .read()
            .cost_layer()
            .cost_at(target)
            .is_some_and(|cost| cost >= threshold)
    }

    fn set_state(&mut self, state: ExecutorState) {
        if self.state != state {
            debug!(robot = %self.mission.robot, from = ?self.state, to = ?state, "Executor state");
            self.state = state;
        }
    }
}

/// Side reported to the resolver: the horizontal side for a robot seen left,
/// right or diagonal, the vertical side otherwise. The intended motion
/// decides first; the seen sector breaks ties.
pub fn conflict_side(seen: Sector, dx: f64, dy: f64) -> Sector {
    if seen.slot() == Slot::Vertical {
        if dy < 0.0 || seen == Sector::Front {
            Sector::Front
        } else {
            Sector::Back
        }
    } else if dx > 0.0 || seen.contains_left() {
        Sector::Left
    } else {
        Sector::Right
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Slide {
    goal: Point2,
    sideways: bool,
}

/// A horizontal block slides along y, anything else along x, to the
/// waypoint's coordinate on that axis. When the waypoint already lies on
/// the robot's line the slide goes `reach` to the first free side instead,
/// away from a diagonal block.
fn plan_slide(
    direction: Sector,
    cur: Point2,
    target: Point2,
    tolerance: f64,
    reach: f64,
    summary: &SectorSummary,
) -> Option<Slide> {
    let along_y = direction.slot() == Slot::Horizontal;
    let toward = if along_y {
        Point2::new(cur.x, target.y)
    } else {
        Point2::new(target.x, cur.y)
    };
    if toward.distance_to(cur) >= tolerance {
        return Some(Slide { goal: toward, sideways: false });
    }

    let sides = if along_y {
        [Sector::Back, Sector::Front]
    } else if direction.contains_left() {
        [Sector::Right, Sector::Left]
    } else {
        [Sector::Left, Sector::Right]
    };
    sides
        .into_iter()
        .find(|side| summary.is_direction_free(*side))
        .map(|side| {
            let (ox, oy) = side.offset();
            Slide {
                goal: cur.offset(ox * reach, oy * reach),
                sideways: true,
            }
        })
}

/// Root mean square of each executed pose's distance to the nearest planned
/// waypoint. `None` when either side is empty.
pub fn tracking_rmse(planned: &[Point2], executed: &[Point2]) -> Option<f64> {
    if planned.is_empty() || executed.is_empty() {
        return None;
    }
    let sum: f64 = executed
        .iter()
        .map(|p| {
            planned
                .iter()
                .map(|q| {
                    let d = p.distance_to(*q);
                    d * d
                })
                .fold(f64::INFINITY, f64::min)
        })
        .sum();
    Some((sum / executed.len() as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::context::test_support::{fast_spec, sim_context};
    use crate::domain::classifier::RobotHit;
    use crate::domain::geometry::CellSet;
    use crate::domain::ports::RobotConnector;
    use crate::domain::robot::{RobotId, RobotStatus};
    use crate::domain::sector::SectorMask;
    use crate::infrastructure::event_bus::{EventBusError, FleetEvent};
    use crate::infrastructure::obstacle_decisions::ObstacleDecision;
    use parking_lot::Mutex;
    use std::time::Duration;

    fn rob(id: &str) -> RobotId {
        RobotId::new(id)
    }

    async fn executor_for(ctx: &FleetContext, id: &str, goal: Point2) -> PathExecutor {
        let port = ctx.connector.connect(&rob(id)).await.unwrap();
        ctx.store.mark_busy(&rob(id), goal).unwrap();
        PathExecutor::new(ctx.clone(), Mission::new(rob(id), goal), port)
    }

    /// Collects every replan cause published from now on.
    fn record_replans(ctx: &FleetContext) -> Arc<Mutex<Vec<ReplanCause>>> {
        let causes = Arc::new(Mutex::new(Vec::new()));
        let sink = causes.clone();
        let mut rx = ctx.events.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(FleetEvent::Mission(MissionEvent::ReplanTriggered { cause, .. })) => {
                        sink.lock().push(cause)
                    }
                    Ok(_) | Err(EventBusError::Lagged(_)) => {}
                    Err(_) => break,
                }
            }
        });
        causes
    }

    /// Marks waypoint `index` of the next `plans` routes occupied as soon as
    /// each route is published.
    fn occupy_planned_waypoint(ctx: &FleetContext, index: usize, plans: usize) {
        let map = ctx.map.clone();
        let mut rx = ctx.events.subscribe();
        tokio::spawn(async move {
            let mut left = plans;
            while left > 0 {
                match rx.recv().await {
                    Ok(FleetEvent::Mission(MissionEvent::PathPlanned { waypoints, .. })) => {
                        if let Some(at) = waypoints.get(index) {
                            let mut map = map.write();
                            map.stamp(at.x, at.y);
                            map.rebuild_costmap();
                        }
                        left -= 1;
                    }
                    Ok(_) | Err(EventBusError::Lagged(_)) => {}
                    Err(_) => break,
                }
            }
        });
    }

    /// Answers every pause of `robot` with `action` until the mission ends.
    fn answer_pauses(
        ctx: &FleetContext,
        robot: &str,
        action: ObstacleAction,
    ) -> tokio::task::JoinHandle<usize> {
        let decisions = ctx.decisions.clone();
        let robot = rob(robot);
        let store = ctx.store.clone();
        tokio::spawn(async move {
            let mut answered = 0;
            while store.status(&robot) == Some(RobotStatus::Busy) {
                let decision = ObstacleDecision { action, goal: None };
                if decisions.submit(Some(&robot), decision).await.is_ok() {
                    answered += 1;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            answered
        })
    }

    #[test]
    fn test_plan_slide() {
        let free = SectorSummary::default();
        let cur = Point2::new(0.46, 0.0);

        let slide = plan_slide(Sector::Left, cur, Point2::new(0.6, 0.4), 0.1, 0.95, &free).unwrap();
        assert_eq!(slide, Slide { goal: Point2::new(0.46, 0.4), sideways: false });

        // waypoint straight ahead: step aside instead of standing still
        let slide = plan_slide(Sector::Left, cur, Point2::new(0.6, 0.0), 0.1, 0.95, &free).unwrap();
        assert!(slide.sideways);
        assert!(slide.goal.distance_to(Point2::new(0.46, 0.95)) < 1e-9);

        let mut seen = SectorMask::default();
        seen.insert(Sector::Back);
        let back_blocked = SectorSummary {
            vertical: Some(Sector::Back),
            seen,
            ..SectorSummary::default()
        };
        let slide = plan_slide(Sector::Left, cur, Point2::new(0.6, 0.0), 0.1, 0.95, &back_blocked).unwrap();
        assert!(slide.goal.distance_to(Point2::new(0.46, -0.95)) < 1e-9);

        let slide = plan_slide(Sector::FrontLeft, Point2::default(), Point2::new(0.05, -0.5), 0.1, 0.95, &free)
            .unwrap();
        assert!(slide.goal.distance_to(Point2::new(-0.95, 0.0)) < 1e-9);

        let boxed_in = SectorSummary {
            nearest_robot: Some(RobotHit {
                robot: rob("Rob1"),
                sector: Sector::Front,
                distance: 0.5,
            }),
            ..back_blocked
        };
        assert_eq!(plan_slide(Sector::Left, cur, Point2::new(0.6, 0.0), 0.1, 0.95, &boxed_in), None);
    }

    #[test]
    fn test_conflict_side() {
        assert_eq!(conflict_side(Sector::Front, 0.0, -1.0), Sector::Front);
        assert_eq!(conflict_side(Sector::Back, 0.0, -1.0), Sector::Front);
        assert_eq!(conflict_side(Sector::Back, 0.0, 1.0), Sector::Back);
        assert_eq!(conflict_side(Sector::Right, 1.0, 0.0), Sector::Left);
        assert_eq!(conflict_side(Sector::FrontLeft, -1.0, 0.0), Sector::Left);
        assert_eq!(conflict_side(Sector::BackRight, -1.0, 0.0), Sector::Right);
    }

    #[test]
    fn test_tracking_rmse() {
        let plan = [Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)];
        assert_eq!(tracking_rmse(&plan, &[]), None);
        assert_eq!(tracking_rmse(&plan, &plan), Some(0.0));
        let rmse = tracking_rmse(&plan, &[Point2::new(0.0, 0.3), Point2::new(1.0, -0.4)]).unwrap();
        assert!((rmse - (0.125f64).sqrt()).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_reaches_goal_on_free_map() {
        let (ctx, world) = sim_context(fast_spec(), &[("Rob0", Point2::new(0.0, 0.0))]);
        let mut rx = ctx.events.subscribe_robot(rob("Rob0"));
        let outcome = executor_for(&ctx, "Rob0", Point2::new(1.0, 0.6)).await.run().await;

        assert!(outcome.is_done(), "{outcome:?}");
        assert_eq!(outcome.replans, 0);
        let p = world.peek_position(&rob("Rob0")).unwrap();
        assert!((p.x - 1.0).abs() < 0.1 && (p.y - 0.6).abs() < 0.1, "ended at {p}");
        assert!(world.wheel_speeds(&rob("Rob0")).unwrap().is_stopped());
        assert_eq!(ctx.store.status(&rob("Rob0")), Some(RobotStatus::Idle));
        assert!(matches!(rx.recv().await, Ok(MissionEvent::MissionStarted { .. })));
    }

    #[tokio::test]
    async fn test_blocked_goal_fails_without_replanning() {
        let (ctx, world) = sim_context(fast_spec(), &[("Rob0", Point2::new(0.0, 0.0))]);
        {
            let mut map = ctx.map.write();
            map.stamp(2.0, 0.0);
            map.rebuild_costmap();
        }
        let outcome = executor_for(&ctx, "Rob0", Point2::new(2.0, 0.0)).await.run().await;
        assert_eq!(outcome.state, MissionState::Failed);
        assert_eq!(outcome.replans, 0);
        assert!(outcome.reason.unwrap().contains("blocked"));
        assert_eq!(world.peek_position(&rob("Rob0")), Some(Point2::new(0.0, 0.0)));
    }

    #[tokio::test]
    async fn test_abort_stops_within_one_tick() {
        let (ctx, world) = sim_context(fast_spec(), &[("Rob0", Point2::new(0.0, 0.0))]);
        let exec = executor_for(&ctx, "Rob0", Point2::new(4.0, 0.0)).await;
        let handle = tokio::spawn(exec.run());

        while world.steps(&rob("Rob0")) < 10 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(ctx.store.request_abort(&rob("Rob0")));
        let at_abort = world.steps(&rob("Rob0"));

        let outcome = handle.await.unwrap();
        assert_eq!(outcome.reason.as_deref(), Some("abort requested"));
        assert!(world.steps(&rob("Rob0")) <= at_abort + 1);
        assert!(world.wheel_speeds(&rob("Rob0")).unwrap().is_stopped());
        assert_eq!(ctx.store.status(&rob("Rob0")), Some(RobotStatus::Idle));
    }

    #[tokio::test]
    async fn test_static_obstacle_pauses_then_stop() {
        let (ctx, world) = sim_context(fast_spec(), &[("Rob0", Point2::new(0.0, 0.0))]);
        world.add_obstacle(Point2::new(1.2, 0.0));
        let mut rx = ctx.events.subscribe();
        let exec = executor_for(&ctx, "Rob0", Point2::new(3.0, 0.0)).await;
        let handle = tokio::spawn(exec.run());

        loop {
            match rx.recv().await {
                Ok(FleetEvent::Mission(MissionEvent::ObstaclePaused { sector, .. })) => {
                    assert_eq!(sector, Sector::Left);
                    break;
                }
                Ok(_) | Err(_) => {}
            }
        }
        let decision = ObstacleDecision { action: ObstacleAction::Stop, goal: None };
        // the ticket may be registered just after the event goes out
        let mut delivered = None;
        for _ in 0..100 {
            if let Ok(robot) = ctx.decisions.submit(None, decision).await {
                delivered = Some(robot);
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(delivered, Some(rob("Rob0")));

        let outcome = handle.await.unwrap();
        assert_eq!(outcome.state, MissionState::Failed);
        assert_eq!(outcome.reason.as_deref(), Some("stopped by operator at left obstacle"));
        let p = world.peek_position(&rob("Rob0")).unwrap();
        assert!(p.x < 1.2);
    }

    #[tokio::test]
    async fn test_redirect_while_paused() {
        let (ctx, world) = sim_context(fast_spec(), &[("Rob0", Point2::new(0.0, 0.0))]);
        world.add_obstacle(Point2::new(1.2, 0.0));
        let exec = executor_for(&ctx, "Rob0", Point2::new(3.0, 0.0)).await;
        let handle = tokio::spawn(exec.run());

        let decision = ObstacleDecision {
            action: ObstacleAction::SetGoal,
            goal: Some(Point2::new(0.0, 1.0)),
        };
        let mut delivered = false;
        for _ in 0..5_000 {
            if ctx.decisions.submit(Some(&rob("Rob0")), decision).await.is_ok() {
                delivered = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(delivered);

        let outcome = handle.await.unwrap();
        assert!(outcome.is_done(), "{outcome:?}");
        assert_eq!(outcome.replans, 1);
        let p = world.peek_position(&rob("Rob0")).unwrap();
        assert!(p.distance_to(Point2::new(0.0, 1.0)) < 0.15, "ended at {p}");
    }

    #[tokio::test]
    async fn test_blocked_waypoint_replans_once() {
        let (ctx, world) = sim_context(fast_spec(), &[("Rob0", Point2::new(0.0, 0.0))]);
        let causes = record_replans(&ctx);
        occupy_planned_waypoint(&ctx, 4, 1);

        let outcome = executor_for(&ctx, "Rob0", Point2::new(2.0, 0.0)).await.run().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(outcome.is_done(), "{outcome:?}");
        assert_eq!(outcome.replans, 1);
        assert_eq!(*causes.lock(), vec![ReplanCause::BlockedWaypoint]);
        let p = world.peek_position(&rob("Rob0")).unwrap();
        assert!(p.distance_to(Point2::new(2.0, 0.0)) < 0.15, "ended at {p}");
    }

    #[tokio::test]
    async fn test_replan_limit_fails_mission() {
        let mut spec = fast_spec();
        spec.executor.max_replans = 2;
        let (ctx, _world) = sim_context(spec, &[("Rob0", Point2::new(0.0, 0.0))]);
        let causes = record_replans(&ctx);
        occupy_planned_waypoint(&ctx, 3, usize::MAX);

        let outcome = executor_for(&ctx, "Rob0", Point2::new(3.0, 0.0)).await.run().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(outcome.state, MissionState::Failed);
        assert_eq!(outcome.replans, 2);
        assert_eq!(
            outcome.reason,
            Some(MissionFailure::ReplanLimitExceeded { limit: 2 }.to_string())
        );
        assert_eq!(*causes.lock(), vec![ReplanCause::BlockedWaypoint; 2]);
        assert_eq!(ctx.store.status(&rob("Rob0")), Some(RobotStatus::Idle));
    }

    #[tokio::test]
    async fn test_continue_detours_past_obstacle() {
        let mut spec = fast_spec();
        spec.planner.proximity_rings = 3;
        let (ctx, world) = sim_context(spec, &[("Rob0", Point2::new(0.0, 0.0))]);
        world.add_obstacle(Point2::new(1.2, 0.0));
        let causes = record_replans(&ctx);
        let exec = executor_for(&ctx, "Rob0", Point2::new(3.0, 0.0)).await;
        let answers = answer_pauses(&ctx, "Rob0", ObstacleAction::Continue);
        // the answering task stops once the mission releases the robot
        let outcome = exec.run().await;
        let answered = answers.await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(outcome.is_done(), "{outcome:?}");
        assert!(answered >= 1);
        assert!(causes
            .lock()
            .iter()
            .any(|c| matches!(c, ReplanCause::StaticObstacle { sector: Sector::Left })));
        let p = world.peek_position(&rob("Rob0")).unwrap();
        assert!(p.distance_to(Point2::new(3.0, 0.0)) < 0.15, "ended at {p}");
    }

    #[tokio::test]
    async fn test_wait_stays_paused() {
        let (ctx, world) = sim_context(fast_spec(), &[("Rob0", Point2::new(0.0, 0.0))]);
        world.add_obstacle(Point2::new(0.5, 0.0));
        let mut exec = executor_for(&ctx, "Rob0", Point2::new(3.0, 0.0)).await;
        let waits = answer_pauses(&ctx, "Rob0", ObstacleAction::Wait);

        let paused = tokio::time::timeout(
            Duration::from_millis(200),
            exec.handle_static(Sector::Left, Point2::new(0.2, 0.0)),
        )
        .await;

        assert!(paused.is_err(), "left the pause: {:?}", paused.map(|r| r.map(|_| ())));
        assert_eq!(exec.state(), ExecutorState::BlockedByStaticPaused);
        assert_eq!(world.peek_position(&rob("Rob0")), Some(Point2::new(0.0, 0.0)));
        ctx.store.mark_idle(&rob("Rob0"));
        assert!(waits.await.unwrap() >= 2, "wait must re-arm the pause");
    }

    #[tokio::test]
    async fn test_unresolved_conflict_replans() {
        let mut spec = fast_spec();
        spec.executor.max_replans = 2;
        let (ctx, world) = sim_context(
            spec,
            &[("Rob0", Point2::new(0.0, 0.0)), ("Rob1", Point2::new(1.5, 0.0))],
        );
        let ctx = ctx.with_known_free(CellSet::new());
        let causes = record_replans(&ctx);

        let outcome = executor_for(&ctx, "Rob0", Point2::new(3.0, 0.0)).await.run().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(outcome.state, MissionState::Failed);
        assert_eq!(outcome.replans, 2);
        let expected = ReplanCause::ConflictUnresolved { blocker: rob("Rob1") };
        assert_eq!(*causes.lock(), vec![expected.clone(), expected]);
        assert_eq!(world.peek_position(&rob("Rob1")), Some(Point2::new(1.5, 0.0)));
        assert_eq!(ctx.store.status(&rob("Rob1")), Some(RobotStatus::Idle));
    }

    #[tokio::test]
    async fn test_abort_while_blocker_parks() {
        let (ctx, world) = sim_context(
            fast_spec(),
            &[("Rob0", Point2::new(0.0, 0.0)), ("Rob1", Point2::new(0.0, -0.7))],
        );
        let handle = tokio::spawn(executor_for(&ctx, "Rob0", Point2::new(0.0, -2.0)).await.run());

        while ctx.store.parking_record(&rob("Rob1")).is_none() || world.steps(&rob("Rob1")) < 5 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(ctx.store.request_abort(&rob("Rob0")));
        let at_abort = world.steps(&rob("Rob1"));

        let outcome = handle.await.unwrap();
        assert_eq!(outcome.reason.as_deref(), Some("abort requested"));
        assert!(world.steps(&rob("Rob1")) <= at_abort + 2);
        assert!(world.wheel_speeds(&rob("Rob1")).unwrap().is_stopped());
        assert!(!ctx.store.is_abort_requested(&rob("Rob0")));
        assert_eq!(ctx.store.status(&rob("Rob1")), Some(RobotStatus::Idle));
    }
}
