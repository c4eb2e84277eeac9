// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Conflict Resolver
//!
//! Moves a robot that blocks another robot's path to a nearby parking spot,
//! and brings it back once the requesting mission is done.
//!
//! The blocker is surveyed with its own sensors. While it drives, the
//! direction it is heading must stay free; if it closes, the blocker stops
//! and a new spot is chosen from where it stands, for the same cause. The
//! record keeps the home of the first displacement.

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::context::FleetContext;
use crate::application::motion::MotionDriver;
use crate::domain::classifier::SectorSummary;
use crate::domain::events::ParkingEvent;
use crate::domain::geometry::Point2;
use crate::domain::parking::{choose_spot, ParkingRecord, ParkingSpot};
use crate::domain::ports::{PortError, RobotPort};
use crate::domain::robot::RobotId;
use crate::domain::sector::Sector;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("no parking spot clears {blocker} (blocking at {cause})")]
    ConflictUnresolved { blocker: RobotId, cause: Sector },

    #[error("{0} is running its own mission")]
    BlockerBusy(RobotId),

    #[error("{robot} did not reach {target} within {ticks} ticks")]
    DriveTimeout { robot: RobotId, target: Point2, ticks: u32 },

    #[error("mission of {0} aborted while parking")]
    Aborted(RobotId),

    #[error(transparent)]
    Port(#[from] PortError),
}

pub struct ConflictResolver {
    ctx: FleetContext,
}

impl ConflictResolver {
    pub fn new(ctx: FleetContext) -> Self {
        Self { ctx }
    }

    /// Parks `blocker`, which `active` saw at `cause`. Returns the spot it
    /// finally reached.
    ///
    /// The blocker is claimed before anything is awaited and released only
    /// if the claim still owns it afterwards.
    pub async fn request_clear(
        &self,
        active: &RobotId,
        blocker: &RobotId,
        cause: Sector,
    ) -> Result<ParkingSpot, ResolverError> {
        self.ctx
            .store
            .claim_for_parking(blocker)
            .map_err(|_| ResolverError::BlockerBusy(blocker.clone()))?;
        let result = self.park(active, blocker, cause).await;
        if !self.ctx.store.release_parking_claim(blocker) {
            warn!(robot = %blocker, "Parking claim lost before release");
        }
        result
    }

    async fn park(
        &self,
        active: &RobotId,
        blocker: &RobotId,
        cause: Sector,
    ) -> Result<ParkingSpot, ResolverError> {
        let port = self.ctx.connector.connect(blocker).await?;
        let from = self.current_position(&port).await?;
        let summary = self.survey(&port, from).await?;

        let Some(spot) = self.choose(&summary, from, cause) else {
            self.publish_failure(blocker, active, cause);
            return Err(ResolverError::ConflictUnresolved {
                blocker: blocker.clone(),
                cause,
            });
        };

        let record = self.ctx.store.record_parking(blocker, spot.target, active, from);
        info!(
            robot = %blocker,
            requested_by = %active,
            direction = %spot.direction,
            target = %spot.target,
            "Parking blocking robot"
        );
        metrics::counter!("fleet_parking_episodes_total").increment(1);

        match self.drive_to_park(&port, active, cause, spot).await {
            Ok(reached) => {
                self.ctx.events.publish_parking_event(ParkingEvent::RobotParked {
                    robot: blocker.clone(),
                    requested_by: active.clone(),
                    direction: reached.direction,
                    home: record.home,
                    park: reached.target,
                    parked_at: Utc::now(),
                });
                Ok(reached)
            }
            Err(e) => {
                // Best effort; the port may be what failed.
                let _ = port.stop().await;
                if matches!(e, ResolverError::ConflictUnresolved { .. }) {
                    self.publish_failure(blocker, active, cause);
                }
                Err(e)
            }
        }
    }

    /// Drives every robot parked on behalf of `active` back home and drops
    /// its record. Robots busy with their own mission keep their place.
    /// Returns the robots that made it home.
    pub async fn return_parked(&self, active: &RobotId) -> Vec<RobotId> {
        let mut returned = Vec::new();
        for record in self.ctx.store.parked_by(active) {
            if self.ctx.store.claim_for_parking(&record.robot).is_err() {
                debug!(robot = %record.robot, "Parked robot is busy; not returning it");
                self.ctx.store.remove_parking(&record.robot);
                continue;
            }
            match self.drive_home(&record).await {
                Ok(()) => {
                    info!(robot = %record.robot, home = %record.home, "Parked robot returned home");
                    self.ctx.events.publish_parking_event(ParkingEvent::RobotReturned {
                        robot: record.robot.clone(),
                        home: record.home,
                        returned_at: Utc::now(),
                    });
                    returned.push(record.robot.clone());
                }
                Err(e) => warn!(robot = %record.robot, error = %e, "Failed to return parked robot"),
            }
            if !self.ctx.store.release_parking_claim(&record.robot) {
                warn!(robot = %record.robot, "Parking claim lost before release");
            }
            self.ctx.store.remove_parking(&record.robot);
        }
        returned
    }

    async fn drive_to_park(
        &self,
        port: &Arc<dyn RobotPort>,
        active: &RobotId,
        cause: Sector,
        spot: ParkingSpot,
    ) -> Result<ParkingSpot, ResolverError> {
        let rules = self.ctx.config.parking.rules;
        let tick = self.ctx.config.parking.tick_interval();
        let blocker = port.robot_id().clone();
        let driver = MotionDriver::new(port.clone(), self.ctx.config.executor.speed);
        let mut spot = spot;

        for _ in 0..rules.max_ticks {
            if self.ctx.store.is_abort_requested(active) {
                driver.stop().await?;
                info!(robot = %blocker, requested_by = %active, "Requesting mission aborted; parking abandoned");
                return Err(ResolverError::Aborted(active.clone()));
            }
            let cur = self.current_position(port).await?;
            let (dx, dy) = (spot.target.x - cur.x, spot.target.y - cur.y);
            if dx.abs() < rules.reach_tolerance && dy.abs() < rules.reach_tolerance {
                driver.stop().await?;
                info!(robot = %blocker, at = %cur, "Parked");
                return Ok(spot);
            }

            if let Some(heading) = Sector::from_vector(dx, dy, rules.motion_ratio) {
                let summary = self.survey(port, cur).await?;
                if !summary.is_direction_free(heading) {
                    driver.stop().await?;
                    debug!(robot = %blocker, %heading, "Parking direction closed; choosing again");
                    spot = self
                        .choose(&summary, cur, cause)
                        .ok_or_else(|| ResolverError::ConflictUnresolved {
                            blocker: blocker.clone(),
                            cause,
                        })?;
                    self.ctx.store.record_parking(&blocker, spot.target, active, cur);
                    tokio::time::sleep(tick).await;
                    continue;
                }
            }

            let yaw = port.orientation().await?.yaw;
            driver.step_toward(cur, spot.target, rules.diagonal_threshold, yaw).await?;
            tokio::time::sleep(tick).await;
        }

        driver.stop().await?;
        Err(ResolverError::DriveTimeout {
            robot: blocker,
            target: spot.target,
            ticks: rules.max_ticks,
        })
    }

    async fn drive_home(&self, record: &ParkingRecord) -> Result<(), ResolverError> {
        let rules = self.ctx.config.parking.rules;
        let tick = self.ctx.config.parking.tick_interval();
        let port = self.ctx.connector.connect(&record.robot).await?;
        let driver = MotionDriver::new(port.clone(), self.ctx.config.executor.speed);

        let mut outcome = Err(ResolverError::DriveTimeout {
            robot: record.robot.clone(),
            target: record.home,
            ticks: rules.max_ticks,
        });
        for _ in 0..rules.max_ticks {
            let cur = match self.current_position(&port).await {
                Ok(cur) => cur,
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            };
            let (dx, dy) = (record.home.x - cur.x, record.home.y - cur.y);
            if dx.abs() < rules.reach_tolerance && dy.abs() < rules.reach_tolerance {
                outcome = Ok(());
                break;
            }
            let step = async {
                let yaw = port.orientation().await?.yaw;
                driver.step_toward(cur, record.home, rules.diagonal_threshold, yaw).await
            };
            if let Err(e) = step.await {
                outcome = Err(e.into());
                break;
            }
            tokio::time::sleep(tick).await;
        }
        let stopped = driver.stop().await;
        outcome?;
        stopped.map_err(Into::into)
    }

    /// Holds the reference attitude, reads the pose and records it.
    async fn current_position(&self, port: &Arc<dyn RobotPort>) -> Result<Point2, ResolverError> {
        port.set_orientation(self.ctx.config.executor.reference_orientation).await?;
        let position = port.position().await?;
        let orientation = port.orientation().await?;
        self.ctx.store.update_pose(port.robot_id(), position, orientation);
        Ok(position)
    }

    async fn survey(&self, port: &Arc<dyn RobotPort>, at: Point2) -> Result<SectorSummary, ResolverError> {
        let points = self.ctx.sense(port.as_ref()).await?;
        Ok(self.ctx.classify(port.robot_id(), at, &points))
    }

    fn choose(&self, summary: &SectorSummary, from: Point2, cause: Sector) -> Option<ParkingSpot> {
        let geometry = self.ctx.geometry();
        choose_spot(
            summary,
            from,
            cause,
            &self.ctx.known_free,
            &geometry,
            self.ctx.config.parking.rules.safe_margin,
        )
    }

    fn publish_failure(&self, blocker: &RobotId, active: &RobotId, cause: Sector) {
        warn!(robot = %blocker, requested_by = %active, %cause, "No parking spot available");
        self.ctx.events.publish_parking_event(ParkingEvent::ParkingFailed {
            robot: blocker.clone(),
            requested_by: active.clone(),
            cause,
            failed_at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::context::test_support::{fast_spec, sim_context};
    use crate::domain::command::DispatchError;
    use crate::domain::geometry::CellSet;
    use crate::domain::robot::RobotStatus;
    use crate::infrastructure::event_bus::FleetEvent;
    use std::time::Duration;

    fn rob(id: &str) -> RobotId {
        RobotId::new(id)
    }

    #[tokio::test]
    async fn test_parks_to_free_side_and_returns() {
        let (ctx, world) = sim_context(
            fast_spec(),
            &[("Rob0", Point2::new(0.0, 0.0)), ("Rob1", Point2::new(0.0, -0.7))],
        );
        let mut rx = ctx.events.subscribe();
        let resolver = ConflictResolver::new(ctx.clone());

        let spot = resolver.request_clear(&rob("Rob0"), &rob("Rob1"), Sector::Front).await.unwrap();
        assert_eq!(spot.direction, Sector::Left);
        let parked = world.peek_position(&rob("Rob1")).unwrap();
        assert!(parked.distance_to(Point2::new(2.0, -0.7)) < 0.2, "parked at {parked}");

        let record = ctx.store.parking_record(&rob("Rob1")).unwrap();
        assert_eq!(record.home, Point2::new(0.0, -0.7));
        assert_eq!(record.requested_by, rob("Rob0"));
        assert_eq!(ctx.store.status(&rob("Rob1")), Some(RobotStatus::Idle));
        assert!(matches!(
            rx.try_recv(),
            Ok(FleetEvent::Parking(ParkingEvent::RobotParked { direction: Sector::Left, .. }))
        ));

        let returned = resolver.return_parked(&rob("Rob0")).await;
        assert_eq!(returned, vec![rob("Rob1")]);
        let back = world.peek_position(&rob("Rob1")).unwrap();
        assert!((back.x - 0.0).abs() < 0.12 && (back.y + 0.7).abs() < 0.12, "back at {back}");
        assert!(ctx.store.parking_record(&rob("Rob1")).is_none());
        assert!(world.wheel_speeds(&rob("Rob1")).unwrap().is_stopped());
    }

    #[tokio::test]
    async fn test_no_known_free_cells_fails() {
        let (ctx, world) = sim_context(
            fast_spec(),
            &[("Rob0", Point2::new(0.0, 0.0)), ("Rob1", Point2::new(0.0, -0.7))],
        );
        let ctx = ctx.with_known_free(CellSet::new());
        let mut rx = ctx.events.subscribe();

        let err = ConflictResolver::new(ctx.clone())
            .request_clear(&rob("Rob0"), &rob("Rob1"), Sector::Front)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::ConflictUnresolved { cause: Sector::Front, .. }));
        assert!(ctx.store.parking_record(&rob("Rob1")).is_none());
        assert_eq!(world.peek_position(&rob("Rob1")), Some(Point2::new(0.0, -0.7)));
        assert!(matches!(rx.try_recv(), Ok(FleetEvent::Parking(ParkingEvent::ParkingFailed { .. }))));
    }

    #[tokio::test]
    async fn test_busy_blocker_is_refused() {
        let (ctx, _world) = sim_context(
            fast_spec(),
            &[("Rob0", Point2::new(0.0, 0.0)), ("Rob1", Point2::new(0.0, -0.7))],
        );
        ctx.store.mark_busy(&rob("Rob1"), Point2::new(0.0, -3.0)).unwrap();
        let err = ConflictResolver::new(ctx)
            .request_clear(&rob("Rob0"), &rob("Rob1"), Sector::Front)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::BlockerBusy(_)));
    }

    #[tokio::test]
    async fn test_parking_blocker_cannot_be_dispatched() {
        let (ctx, world) = sim_context(
            fast_spec(),
            &[("Rob0", Point2::new(0.0, 0.0)), ("Rob1", Point2::new(0.0, -0.7))],
        );
        let resolver = ConflictResolver::new(ctx.clone());
        let handle = tokio::spawn(async move {
            resolver.request_clear(&rob("Rob0"), &rob("Rob1"), Sector::Front).await
        });

        while ctx.store.status(&rob("Rob1")) != Some(RobotStatus::Busy) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(
            ctx.store.mark_busy(&rob("Rob1"), Point2::new(0.0, -3.0)),
            Err(DispatchError::RobotBusy(rob("Rob1")))
        );

        let spot = handle.await.unwrap().unwrap();
        let parked = world.peek_position(&rob("Rob1")).unwrap();
        assert!(parked.distance_to(spot.target) < 0.2, "parked at {parked}");
        let state = ctx.store.get(&rob("Rob1")).unwrap();
        assert_eq!(state.status, RobotStatus::Idle);
        assert_eq!(state.goal, None);
    }

    #[tokio::test]
    async fn test_requester_abort_stops_parking() {
        let (ctx, world) = sim_context(
            fast_spec(),
            &[("Rob0", Point2::new(0.0, 0.0)), ("Rob1", Point2::new(0.0, -0.7))],
        );
        let resolver = ConflictResolver::new(ctx.clone());
        let handle = tokio::spawn(async move {
            resolver.request_clear(&rob("Rob0"), &rob("Rob1"), Sector::Front).await
        });

        while world.steps(&rob("Rob1")) < 5 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(ctx.store.request_abort(&rob("Rob0")));
        let at_abort = world.steps(&rob("Rob1"));

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, ResolverError::Aborted(ref id) if id == &rob("Rob0")), "{err:?}");
        assert!(world.steps(&rob("Rob1")) <= at_abort + 1);
        assert!(world.wheel_speeds(&rob("Rob1")).unwrap().is_stopped());
        let p = world.peek_position(&rob("Rob1")).unwrap();
        assert!(p.x < 1.5, "kept driving to {p}");
        assert_eq!(ctx.store.status(&rob("Rob1")), Some(RobotStatus::Idle));
        // the requester's executor consumes the flag
        assert!(ctx.store.is_abort_requested(&rob("Rob0")));
    }

    #[tokio::test]
    async fn test_closed_direction_picks_new_spot() {
        let (ctx, world) = sim_context(
            fast_spec(),
            &[("Rob0", Point2::new(0.0, 0.0)), ("Rob1", Point2::new(0.0, -0.7))],
        );
        // wall on the left, just beyond classifier range from the start pose
        let resolver = ConflictResolver::new(ctx.clone());
        world.add_wall(Point2::new(0.9, -1.5), Point2::new(0.9, 0.1), 0.1);

        let spot = resolver.request_clear(&rob("Rob0"), &rob("Rob1"), Sector::Front).await.unwrap();
        assert_ne!(spot.direction, Sector::Left);
        assert_ne!(spot.direction, Sector::Front);
        let record = ctx.store.parking_record(&rob("Rob1")).unwrap();
        assert_eq!(record.home, Point2::new(0.0, -0.7));
        assert_eq!(record.park, spot.target);
    }
}
