// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Obstacle Decision Service - operator gate for paused robots
//!
//! A robot stopped in front of a static obstacle registers a pending
//! decision and polls its ticket while it waits. The supervisor routes
//! `obstacle_action` commands here.

use std::collections::HashMap;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use tokio::sync::{oneshot, RwLock};
use tracing::{debug, info};

use crate::domain::command::{DispatchError, ObstacleAction};
use crate::domain::geometry::Point2;
use crate::domain::robot::RobotId;
use crate::domain::sector::Sector;

/// Operator answer delivered to a paused executor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstacleDecision {
    pub action: ObstacleAction,
    /// New mission goal for `go_home` and `set_goal`.
    pub goal: Option<Point2>,
}

#[derive(Debug)]
struct PendingDecision {
    sector: Sector,
    paused_at: DateTime<Utc>,
    response_tx: oneshot::Sender<ObstacleDecision>,
}

/// Pending request summary for status displays
#[derive(Debug, Clone, PartialEq)]
pub struct PendingDecisionInfo {
    pub robot: RobotId,
    pub sector: Sector,
    pub paused_at: DateTime<Utc>,
}

/// Held by the paused executor.
#[derive(Debug)]
pub struct DecisionTicket {
    rx: oneshot::Receiver<ObstacleDecision>,
}

impl DecisionTicket {
    /// Non-blocking check for an answer.
    pub fn poll(&mut self) -> Option<ObstacleDecision> {
        self.rx.try_recv().ok()
    }
}

#[derive(Clone, Default)]
pub struct ObstacleDecisionService {
    pending: Arc<RwLock<HashMap<RobotId, PendingDecision>>>,
}

impl ObstacleDecisionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens (or replaces) the pending decision for `robot`.
    pub async fn register(&self, robot: &RobotId, sector: Sector) -> DecisionTicket {
        let (tx, rx) = oneshot::channel();
        let request = PendingDecision {
            sector,
            paused_at: Utc::now(),
            response_tx: tx,
        };
        self.pending.write().await.insert(robot.clone(), request);
        info!(robot = %robot, sector = %sector, "Waiting for obstacle action");
        DecisionTicket { rx }
    }

    /// Drops the pending decision, e.g. when the obstacle cleared by itself.
    pub async fn cancel(&self, robot: &RobotId) {
        if self.pending.write().await.remove(robot).is_some() {
            debug!(robot = %robot, "Pending obstacle decision withdrawn");
        }
    }

    /// Delivers `decision` to `robot`, or to the only paused robot when
    /// `robot` is `None`. Returns the robot that received it.
    pub async fn submit(
        &self,
        robot: Option<&RobotId>,
        decision: ObstacleDecision,
    ) -> Result<RobotId, DispatchError> {
        let mut pending = self.pending.write().await;
        let target = match robot {
            Some(id) => {
                if !pending.contains_key(id) {
                    return Err(DispatchError::NotPaused(id.clone()));
                }
                id.clone()
            }
            None => {
                let mut ids = pending.keys();
                match (ids.next(), ids.next()) {
                    (Some(only), None) => only.clone(),
                    (None, _) => return Err(DispatchError::NothingPaused),
                    (Some(_), Some(_)) => return Err(DispatchError::AmbiguousPause),
                }
            }
        };

        let request = pending
            .remove(&target)
            .ok_or_else(|| DispatchError::NotPaused(target.clone()))?;
        info!(
            robot = %target,
            action = %decision.action,
            sector = %request.sector,
            "Obstacle action delivered"
        );
        // Receiver dropped means the executor already moved on
        let _ = request.response_tx.send(decision);
        Ok(target)
    }

    pub async fn is_paused(&self, robot: &RobotId) -> bool {
        self.pending.read().await.contains_key(robot)
    }

    /// Pending decisions in robot order
    pub async fn list_pending(&self) -> Vec<PendingDecisionInfo> {
        let pending = self.pending.read().await;
        let mut list: Vec<_> = pending
            .iter()
            .map(|(robot, req)| PendingDecisionInfo {
                robot: robot.clone(),
                sector: req.sector,
                paused_at: req.paused_at,
            })
            .collect();
        list.sort_by(|a, b| a.robot.cmp(&b.robot));
        list
    }
}
