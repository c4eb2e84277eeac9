// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Fleet Supervisor
//!
//! Owns the command loop: decodes each [`Command`] into a dispatch or a
//! query, spawns one executor task per mission, and reaps finished tasks on
//! a fixed tick. Every command gets exactly one [`CommandReply`].
//!
//! Robot selection for `auto` picks the idle robot closest to the goal
//! (ties by id order). A robot whose handles fail to initialise is skipped
//! for that dispatch only.

use futures::future::join_all;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::application::context::FleetContext;
use crate::application::executor::PathExecutor;
use crate::domain::command::{
    Command, CommandReply, Destination, DispatchError, ObstacleAction, RobotPositionView,
    RobotSelector, RobotStatusView,
};
use crate::domain::geometry::Point2;
use crate::domain::mission::{Mission, MissionId, MissionOutcome};
use crate::domain::ports::RobotPort;
use crate::domain::robot::{RobotId, RobotStatus};
use crate::infrastructure::obstacle_decisions::ObstacleDecision;

pub struct FleetSupervisor {
    ctx: FleetContext,
    tasks: HashMap<RobotId, JoinHandle<MissionOutcome>>,
}

impl FleetSupervisor {
    pub fn new(ctx: FleetContext) -> Self {
        Self {
            ctx,
            tasks: HashMap::new(),
        }
    }

    pub fn context(&self) -> &FleetContext {
        &self.ctx
    }

    pub fn active_missions(&self) -> usize {
        self.tasks.values().filter(|h| !h.is_finished()).count()
    }

    /// Serves commands until `shutdown` resolves, or until the intake closes
    /// and every mission has finished. Running missions are aborted on the
    /// way out.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        replies: mpsc::Sender<CommandReply>,
        shutdown: impl Future<Output = ()>,
    ) -> Vec<MissionOutcome> {
        let mut tick = tokio::time::interval(self.ctx.config.supervisor.tick_interval());
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut outcomes = Vec::new();
        let mut intake_open = true;
        info!(robots = self.ctx.store.ids().len(), "Fleet supervisor running");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                command = commands.recv(), if intake_open => match command {
                    Some(command) => {
                        let reply = self.handle(command).await;
                        if replies.send(reply).await.is_err() {
                            debug!("Reply channel closed");
                        }
                    }
                    None => {
                        info!("Command intake closed");
                        intake_open = false;
                    }
                },
                _ = tick.tick() => {
                    outcomes.extend(self.reap().await);
                    if !intake_open && self.tasks.is_empty() {
                        break;
                    }
                }
            }
        }

        outcomes.extend(self.shutdown().await);
        outcomes
    }

    /// Applies one command and returns its reply.
    pub async fn handle(&mut self, command: Command) -> CommandReply {
        let kind = command.kind();
        metrics::counter!("fleet_commands_total", "kind" => kind).increment(1);
        let selector = command.selector();

        let result = match command {
            Command::Move { destination, .. } => self.dispatch_move(selector, &destination).await,
            Command::Status { .. } => self.status(selector),
            Command::Position { .. } => self.position(selector),
            Command::Stop { .. } => self.stop(selector),
            Command::GoHome { .. } => self.go_home(selector).await,
            Command::NearestToLocation { location } => self.nearest_to(&location),
            Command::ObstacleAction {
                action,
                destination,
                ..
            } => self.obstacle_action(selector, action, destination.as_ref()).await,
        };

        result.unwrap_or_else(|e| {
            warn!(command = kind, error = %e, "Command rejected");
            CommandReply::error(kind, e)
        })
    }

    /// Collects finished missions and launches goals queued for robots that
    /// just became idle.
    pub async fn reap(&mut self) -> Vec<MissionOutcome> {
        let finished: Vec<RobotId> = self
            .tasks
            .iter()
            .filter(|(_, h)| h.is_finished())
            .map(|(id, _)| id.clone())
            .collect();

        let mut outcomes = Vec::new();
        for id in finished {
            if let Some(outcome) = self.collect(&id).await {
                outcomes.push(outcome);
            }
        }

        for id in self.ctx.store.ids() {
            if self.tasks.contains_key(&id) {
                continue;
            }
            if let Some(goal) = self.ctx.store.take_pending_goal_if_idle(&id) {
                if let Err(e) = self.launch(&id, goal).await {
                    warn!(robot = %id, error = %e, "Queued mission could not start");
                }
            }
        }
        outcomes
    }

    /// Aborts every running mission and waits for the tasks to wind down.
    pub async fn shutdown(mut self) -> Vec<MissionOutcome> {
        let tasks: Vec<(RobotId, JoinHandle<MissionOutcome>)> = self.tasks.drain().collect();
        for (id, _) in &tasks {
            self.ctx.store.request_abort(id);
        }
        let ctx = &self.ctx;
        join_all(tasks.into_iter().map(|(id, handle)| async move {
            let result = handle.await;
            Self::finish(ctx, &id, result)
        }))
        .await
        .into_iter()
        .flatten()
        .collect()
    }

    async fn collect(&mut self, id: &RobotId) -> Option<MissionOutcome> {
        let handle = self.tasks.remove(id)?;
        let result = handle.await;
        Self::finish(&self.ctx, id, result)
    }

    fn finish(
        ctx: &FleetContext,
        id: &RobotId,
        result: Result<MissionOutcome, tokio::task::JoinError>,
    ) -> Option<MissionOutcome> {
        let outcome = match result {
            Ok(outcome) => {
                if outcome.is_done() {
                    info!(robot = %id, mission_id = %outcome.mission_id, "Mission finished");
                } else {
                    warn!(robot = %id, mission_id = %outcome.mission_id, reason = ?outcome.reason, "Mission ended without reaching its goal");
                }
                Some(outcome)
            }
            Err(e) => {
                error!(robot = %id, error = %e, "Mission task did not complete");
                None
            }
        };
        ctx.store.mark_idle(id);
        outcome
    }

    async fn dispatch_move(
        &mut self,
        selector: RobotSelector,
        destination: &Destination,
    ) -> Result<CommandReply, DispatchError> {
        let goal = self.resolve(destination)?;
        let (robot, port) = match selector {
            RobotSelector::Id(id) => {
                self.ensure_known(&id)?;
                let port = self.ctx.connector.connect(&id).await?;
                (id, port)
            }
            RobotSelector::Auto => self.select_robot(goal).await?,
        };
        let mission_id = self.spawn(&robot, goal, port).await?;
        Ok(CommandReply::Dispatched {
            robot,
            mission_id,
            goal,
        })
    }

    /// Closest idle robot to `goal` that can be reached, ties by id.
    async fn select_robot(&self, goal: Point2) -> Result<(RobotId, Arc<dyn RobotPort>), DispatchError> {
        let mut best: Option<(RobotId, Arc<dyn RobotPort>, f64)> = None;
        for (id, _) in self.ctx.store.idle_robots() {
            if self.is_running(&id) {
                continue;
            }
            let port = match self.ctx.connector.connect(&id).await {
                Ok(port) => port,
                Err(e) => {
                    warn!(robot = %id, error = %e, "Skipping robot for this dispatch");
                    continue;
                }
            };
            let position = match port.position().await {
                Ok(p) => p,
                Err(e) => {
                    warn!(robot = %id, error = %e, "Skipping robot for this dispatch");
                    continue;
                }
            };
            let distance = position.distance_to(goal);
            debug!(robot = %id, %position, distance, "Dispatch candidate");
            if best.as_ref().is_none_or(|(_, _, d)| distance < *d) {
                best = Some((id, port, distance));
            }
        }
        best.map(|(id, port, _)| (id, port)).ok_or(DispatchError::NoIdleRobot)
    }

    async fn launch(&mut self, robot: &RobotId, goal: Point2) -> Result<MissionId, DispatchError> {
        let port = self.ctx.connector.connect(robot).await?;
        self.spawn(robot, goal, port).await
    }

    async fn spawn(
        &mut self,
        robot: &RobotId,
        goal: Point2,
        port: Arc<dyn RobotPort>,
    ) -> Result<MissionId, DispatchError> {
        if self.is_running(robot) {
            return Err(DispatchError::RobotBusy(robot.clone()));
        }
        // A finished but unreaped task is collected before its slot is reused.
        if self.tasks.contains_key(robot) {
            self.collect(robot).await;
        }
        self.ctx.store.mark_busy(robot, goal)?;

        let mission = Mission::new(robot.clone(), goal);
        let mission_id = mission.id;
        info!(robot = %robot, %mission_id, %goal, "Dispatching mission");
        let executor = PathExecutor::new(self.ctx.clone(), mission, port);
        self.tasks.insert(robot.clone(), tokio::spawn(executor.run()));
        Ok(mission_id)
    }

    fn status(&self, selector: RobotSelector) -> Result<CommandReply, DispatchError> {
        let robots = self
            .targets(selector)?
            .into_iter()
            .filter_map(|id| self.ctx.store.get(&id))
            .map(|state| RobotStatusView {
                robot: state.id,
                status: state.status,
                goal: state.goal,
            })
            .collect();
        Ok(CommandReply::Status { robots })
    }

    fn position(&self, selector: RobotSelector) -> Result<CommandReply, DispatchError> {
        let robots = self
            .targets(selector)?
            .into_iter()
            .filter_map(|id| {
                self.ctx
                    .store
                    .position(&id)
                    .map(|position| RobotPositionView { robot: id, position })
            })
            .collect();
        Ok(CommandReply::Position { robots })
    }

    /// Flags the robot, or every busy robot for `auto`, to abort on its next
    /// tick.
    fn stop(&self, selector: RobotSelector) -> Result<CommandReply, DispatchError> {
        let robots: Vec<RobotId> = match selector {
            RobotSelector::Id(id) => {
                self.ensure_known(&id)?;
                vec![id]
            }
            RobotSelector::Auto => self
                .ctx
                .store
                .ids()
                .into_iter()
                .filter(|id| self.ctx.store.status(id) == Some(RobotStatus::Busy))
                .collect(),
        };
        for id in &robots {
            self.ctx.store.request_abort(id);
            info!(robot = %id, "Stop requested");
        }
        Ok(CommandReply::Stopping { robots })
    }

    /// Busy robots abort and then head home; idle robots head home now.
    async fn go_home(&mut self, selector: RobotSelector) -> Result<CommandReply, DispatchError> {
        let robots = self.targets(selector)?;
        for id in &robots {
            let Some(home) = self.ctx.store.home(id) else {
                continue;
            };
            self.ctx.store.set_pending_goal(id, home);
            if self.is_running(id) || self.ctx.store.status(id) == Some(RobotStatus::Busy) {
                self.ctx.store.request_abort(id);
                info!(robot = %id, %home, "Returning home after current mission aborts");
            } else if let Some(goal) = self.ctx.store.take_pending_goal_if_idle(id) {
                self.launch(id, goal).await?;
            }
        }
        Ok(CommandReply::GoingHome { robots })
    }

    fn nearest_to(&self, location: &Destination) -> Result<CommandReply, DispatchError> {
        let point = self.resolve(location)?;
        self.ctx
            .store
            .snapshot()
            .into_iter()
            .map(|state| (state.id, state.position.distance_to(point)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(robot, distance)| CommandReply::Nearest {
                robot,
                location: point,
                distance,
            })
            .ok_or(DispatchError::NoIdleRobot)
    }

    async fn obstacle_action(
        &self,
        selector: RobotSelector,
        action: ObstacleAction,
        destination: Option<&Destination>,
    ) -> Result<CommandReply, DispatchError> {
        let target = match selector {
            RobotSelector::Id(id) => {
                self.ensure_known(&id)?;
                id
            }
            RobotSelector::Auto => {
                let pending = self.ctx.decisions.list_pending().await;
                match pending.as_slice() {
                    [only] => only.robot.clone(),
                    [] => return Err(DispatchError::NothingPaused),
                    _ => return Err(DispatchError::AmbiguousPause),
                }
            }
        };

        let goal = match action {
            ObstacleAction::GoHome => self.ctx.store.home(&target),
            ObstacleAction::SetGoal => {
                let destination = destination.ok_or(DispatchError::MissingDestination)?;
                Some(self.resolve(destination)?)
            }
            ObstacleAction::Wait | ObstacleAction::Continue | ObstacleAction::Stop => None,
        };

        let robot = self
            .ctx
            .decisions
            .submit(Some(&target), ObstacleDecision { action, goal })
            .await?;
        Ok(CommandReply::ObstacleActionAccepted { robot, action })
    }

    fn resolve(&self, destination: &Destination) -> Result<Point2, DispatchError> {
        match destination {
            Destination::Label(label) => self
                .ctx
                .config
                .fleet
                .location(label)
                .ok_or_else(|| DispatchError::UnknownLocation(label.clone())),
            other => other
                .coordinates()
                .ok_or_else(|| DispatchError::UnknownLocation(other.to_string())),
        }
    }

    fn targets(&self, selector: RobotSelector) -> Result<Vec<RobotId>, DispatchError> {
        match selector {
            RobotSelector::Auto => Ok(self.ctx.store.ids()),
            RobotSelector::Id(id) => {
                self.ensure_known(&id)?;
                Ok(vec![id])
            }
        }
    }

    fn ensure_known(&self, id: &RobotId) -> Result<(), DispatchError> {
        if self.ctx.store.contains(id) {
            Ok(())
        } else {
            Err(DispatchError::UnknownRobot(id.clone()))
        }
    }

    fn is_running(&self, id: &RobotId) -> bool {
        self.tasks.get(id).is_some_and(|h| !h.is_finished())
    }
}
