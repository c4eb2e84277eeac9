// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Route planning against a snapshot of the shared map.
//!
//! The map lock is held only to grow the grid and build the planning view.
//! The search itself runs on the blocking pool over an owned snapshot, so
//! other robots keep folding scans into the live map meanwhile.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::application::context::FleetContext;
use crate::domain::geometry::Point2;
use crate::domain::mission::MissionFailure;
use crate::domain::planner::{plan_route, PlannedPath};
use crate::domain::robot::RobotId;

pub struct PlanningService {
    ctx: FleetContext,
}

impl PlanningService {
    pub fn new(ctx: FleetContext) -> Self {
        Self { ctx }
    }

    pub async fn plan(&self, robot: &RobotId, start: Point2, goal: Point2) -> Result<PlannedPath, MissionFailure> {
        self.ctx.ensure_covers(&[start, goal]);

        let planner = self.ctx.config.planner;
        let view = Arc::new(self.ctx.map.read().planning_view(planner.extra_inflation));

        let started = Instant::now();
        let result = tokio::task::spawn_blocking(move || plan_route(view, start, goal, &planner))
            .await
            .map_err(|e| MissionFailure::PlanningTask(e.to_string()))?;
        metrics::histogram!("fleet_planning_seconds").record(started.elapsed().as_secs_f64());

        match result {
            Ok(path) => {
                info!(
                    robot = %robot,
                    %start,
                    %goal,
                    waypoints = path.len(),
                    cost = path.cost,
                    "Route planned"
                );
                Ok(path)
            }
            Err(e) => {
                debug!(robot = %robot, error = %e, "Planning failed");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::context::test_support::{fast_spec, sim_context};
    use crate::domain::planner::PlanningError;

    #[tokio::test]
    async fn test_plans_straight_route() {
        let (ctx, _world) = sim_context(fast_spec(), &[("Rob0", Point2::new(0.0, 0.0))]);
        let path = PlanningService::new(ctx)
            .plan(&RobotId::new("Rob0"), Point2::new(0.0, 0.0), Point2::new(2.0, 0.0))
            .await
            .unwrap();
        assert_eq!(path.len(), 11);
        assert_eq!(path.waypoints[0], Point2::new(0.0, 0.0));
        assert!(path.waypoints.last().unwrap().distance_to(Point2::new(2.0, 0.0)) < 1e-9);
    }

    #[tokio::test]
    async fn test_blocked_goal_fails() {
        let (ctx, _world) = sim_context(fast_spec(), &[("Rob0", Point2::new(0.0, 0.0))]);
        {
            let mut map = ctx.map.write();
            map.stamp(2.0, 0.0);
            map.rebuild_costmap();
        }
        let err = PlanningService::new(ctx)
            .plan(&RobotId::new("Rob0"), Point2::new(0.0, 0.0), Point2::new(2.0, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, MissionFailure::PlanningFailed(PlanningError::GoalBlocked(_))));
    }

    #[tokio::test]
    async fn test_far_goal_grows_map() {
        let (ctx, _world) = sim_context(fast_spec(), &[("Rob0", Point2::new(0.0, 0.0))]);
        let before = ctx.geometry().size();
        let path = PlanningService::new(ctx.clone())
            .plan(&RobotId::new("Rob0"), Point2::new(0.0, 0.0), Point2::new(30.0, 0.0))
            .await
            .unwrap();
        assert!(ctx.geometry().size() > before);
        assert!(path.waypoints.last().unwrap().distance_to(Point2::new(30.0, 0.0)) < 0.2);
    }
}
