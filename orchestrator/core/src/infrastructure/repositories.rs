// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory fleet state store.
//!
//! Robot poses, status, goals, abort flags and parking records live in one
//! structure behind a `parking_lot::RwLock`. Each method is one critical
//! section; callers never hold the guard across an `.await`.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::command::DispatchError;
use crate::domain::geometry::Point2;
use crate::domain::parking::ParkingRecord;
use crate::domain::robot::{Orientation, RobotId, RobotState, RobotStatus};

#[derive(Debug, Default)]
struct FleetState {
    robots: BTreeMap<RobotId, RobotState>,
    parking: BTreeMap<RobotId, ParkingRecord>,
}

#[derive(Clone, Default)]
pub struct FleetStateStore {
    inner: Arc<RwLock<FleetState>>,
}

impl FleetStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with robots at their start positions, which become
    /// their recorded homes.
    pub fn with_robots(robots: impl IntoIterator<Item = (RobotId, Point2)>) -> Self {
        let store = Self::new();
        for (id, position) in robots {
            store.register(id, position);
        }
        store
    }

    /// Adds or resets a robot.
    pub fn register(&self, id: RobotId, position: Point2) {
        let mut state = self.inner.write();
        state.robots.insert(id.clone(), RobotState::new(id, position));
    }

    pub fn contains(&self, id: &RobotId) -> bool {
        self.inner.read().robots.contains_key(id)
    }

    pub fn get(&self, id: &RobotId) -> Option<RobotState> {
        self.inner.read().robots.get(id).cloned()
    }

    /// Robot ids in id order.
    pub fn ids(&self) -> Vec<RobotId> {
        self.inner.read().robots.keys().cloned().collect()
    }

    /// All robots in id order.
    pub fn snapshot(&self) -> Vec<RobotState> {
        self.inner.read().robots.values().cloned().collect()
    }

    pub fn position(&self, id: &RobotId) -> Option<Point2> {
        self.inner.read().robots.get(id).map(|r| r.position)
    }

    pub fn status(&self, id: &RobotId) -> Option<RobotStatus> {
        self.inner.read().robots.get(id).map(|r| r.status)
    }

    pub fn home(&self, id: &RobotId) -> Option<Point2> {
        self.inner.read().robots.get(id).map(|r| r.home)
    }

    /// Every known position except `id`'s own.
    pub fn others(&self, id: &RobotId) -> Vec<(RobotId, Point2)> {
        self.inner
            .read()
            .robots
            .values()
            .filter(|r| &r.id != id)
            .map(|r| (r.id.clone(), r.position))
            .collect()
    }

    pub fn update_pose(&self, id: &RobotId, position: Point2, orientation: Orientation) {
        if let Some(robot) = self.inner.write().robots.get_mut(id) {
            robot.position = position;
            robot.orientation = orientation;
        }
    }

    /// Check-and-set: the robot must exist and be idle. Records the goal and
    /// clears any stale abort flag.
    pub fn mark_busy(&self, id: &RobotId, goal: Point2) -> Result<(), DispatchError> {
        let mut state = self.inner.write();
        let robot = state
            .robots
            .get_mut(id)
            .ok_or_else(|| DispatchError::UnknownRobot(id.clone()))?;
        if !robot.is_idle() {
            return Err(DispatchError::RobotBusy(id.clone()));
        }
        robot.status = RobotStatus::Busy;
        robot.goal = Some(goal);
        robot.abort = false;
        Ok(())
    }

    /// Busy without a mission goal, used while a robot is being parked.
    /// Claims an idle robot for a parking move: `Busy` without a goal.
    /// Same check-and-set as [`mark_busy`](Self::mark_busy), so a mission
    /// and a parking move never hold the same robot.
    pub fn claim_for_parking(&self, id: &RobotId) -> Result<(), DispatchError> {
        let mut state = self.inner.write();
        let robot = state
            .robots
            .get_mut(id)
            .ok_or_else(|| DispatchError::UnknownRobot(id.clone()))?;
        if !robot.is_idle() {
            return Err(DispatchError::RobotBusy(id.clone()));
        }
        robot.status = RobotStatus::Busy;
        robot.goal = None;
        Ok(())
    }

    /// Drops a parking claim. Returns false, leaving the robot untouched,
    /// when the claim no longer owns it.
    pub fn release_parking_claim(&self, id: &RobotId) -> bool {
        match self.inner.write().robots.get_mut(id) {
            Some(robot) if robot.status == RobotStatus::Busy && robot.goal.is_none() => {
                robot.status = RobotStatus::Idle;
                true
            }
            _ => false,
        }
    }

    /// Idle, no goal.
    pub fn mark_idle(&self, id: &RobotId) {
        if let Some(robot) = self.inner.write().robots.get_mut(id) {
            robot.status = RobotStatus::Idle;
            robot.goal = None;
        }
    }

    /// Replaces the goal of a running mission.
    pub fn set_goal(&self, id: &RobotId, goal: Point2) {
        if let Some(robot) = self.inner.write().robots.get_mut(id) {
            robot.goal = Some(goal);
        }
    }

    /// Returns false for unknown robots.
    pub fn request_abort(&self, id: &RobotId) -> bool {
        match self.inner.write().robots.get_mut(id) {
            Some(robot) => {
                robot.abort = true;
                true
            }
            None => false,
        }
    }

    pub fn is_abort_requested(&self, id: &RobotId) -> bool {
        self.inner.read().robots.get(id).is_some_and(|r| r.abort)
    }

    /// Reads and clears the abort flag.
    pub fn take_abort(&self, id: &RobotId) -> bool {
        self.inner
            .write()
            .robots
            .get_mut(id)
            .is_some_and(|r| std::mem::take(&mut r.abort))
    }

    pub fn set_pending_goal(&self, id: &RobotId, goal: Point2) {
        if let Some(robot) = self.inner.write().robots.get_mut(id) {
            robot.pending_goal = Some(goal);
        }
    }

    /// Takes the pending goal only once the robot is idle.
    pub fn take_pending_goal_if_idle(&self, id: &RobotId) -> Option<Point2> {
        let mut state = self.inner.write();
        let robot = state.robots.get_mut(id)?;
        if robot.is_idle() {
            robot.pending_goal.take()
        } else {
            None
        }
    }

    /// Idle robots with their positions, in id order.
    pub fn idle_robots(&self) -> Vec<(RobotId, Point2)> {
        self.inner
            .read()
            .robots
            .values()
            .filter(|r| r.is_idle())
            .map(|r| (r.id.clone(), r.position))
            .collect()
    }

    /// Records a displacement. A robot that is already parked keeps the home
    /// of its first displacement.
    pub fn record_parking(
        &self,
        robot: &RobotId,
        park: Point2,
        requested_by: &RobotId,
        current: Point2,
    ) -> ParkingRecord {
        let mut state = self.inner.write();
        let home = state.parking.get(robot).map_or(current, |r| r.home);
        let record = ParkingRecord {
            robot: robot.clone(),
            home,
            park,
            requested_by: requested_by.clone(),
        };
        state.parking.insert(robot.clone(), record.clone());
        record
    }

    pub fn parking_record(&self, robot: &RobotId) -> Option<ParkingRecord> {
        self.inner.read().parking.get(robot).cloned()
    }

    pub fn parked_by(&self, active: &RobotId) -> Vec<ParkingRecord> {
        self.inner
            .read()
            .parking
            .values()
            .filter(|r| &r.requested_by == active)
            .cloned()
            .collect()
    }

    pub fn remove_parking(&self, robot: &RobotId) -> Option<ParkingRecord> {
        self.inner.write().parking.remove(robot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rob(id: &str) -> RobotId {
        RobotId::new(id)
    }

    fn store() -> FleetStateStore {
        FleetStateStore::with_robots([
            (rob("Rob0"), Point2::new(0.0, 0.0)),
            (rob("Rob1"), Point2::new(5.0, 5.0)),
        ])
    }

    #[test]
    fn test_mark_busy_is_check_and_set() {
        let store = store();
        store.mark_busy(&rob("Rob0"), Point2::new(1.0, 1.0)).unwrap();
        assert_eq!(
            store.mark_busy(&rob("Rob0"), Point2::new(2.0, 2.0)),
            Err(DispatchError::RobotBusy(rob("Rob0")))
        );
        assert_eq!(store.get(&rob("Rob0")).unwrap().goal, Some(Point2::new(1.0, 1.0)));
        assert_eq!(
            store.mark_busy(&rob("Rob9"), Point2::default()),
            Err(DispatchError::UnknownRobot(rob("Rob9")))
        );
        store.mark_idle(&rob("Rob0"));
        let state = store.get(&rob("Rob0")).unwrap();
        assert!(state.is_idle());
        assert_eq!(state.goal, None);
    }

    #[test]
    fn test_parking_claim_excludes_missions() {
        let store = store();
        store.claim_for_parking(&rob("Rob1")).unwrap();
        assert_eq!(
            store.mark_busy(&rob("Rob1"), Point2::new(1.0, 1.0)),
            Err(DispatchError::RobotBusy(rob("Rob1")))
        );
        assert_eq!(
            store.claim_for_parking(&rob("Rob1")),
            Err(DispatchError::RobotBusy(rob("Rob1")))
        );
        assert!(store.idle_robots().iter().all(|(id, _)| id != &rob("Rob1")));
        assert!(store.release_parking_claim(&rob("Rob1")));
        assert_eq!(store.status(&rob("Rob1")), Some(RobotStatus::Idle));

        store.mark_busy(&rob("Rob0"), Point2::new(2.0, 0.0)).unwrap();
        assert_eq!(
            store.claim_for_parking(&rob("Rob0")),
            Err(DispatchError::RobotBusy(rob("Rob0")))
        );
    }

    #[test]
    fn test_release_leaves_mission_owner_alone() {
        let store = store();
        store.claim_for_parking(&rob("Rob1")).unwrap();
        // claim lost, then a mission took the robot
        store.mark_idle(&rob("Rob1"));
        store.mark_busy(&rob("Rob1"), Point2::new(0.0, 3.0)).unwrap();

        assert!(!store.release_parking_claim(&rob("Rob1")));
        let state = store.get(&rob("Rob1")).unwrap();
        assert_eq!(state.status, RobotStatus::Busy);
        assert_eq!(state.goal, Some(Point2::new(0.0, 3.0)));
        assert!(!store.release_parking_claim(&rob("Rob9")));
    }

    #[test]
    fn test_abort_flag_take() {
        let store = store();
        assert!(store.request_abort(&rob("Rob1")));
        assert!(store.is_abort_requested(&rob("Rob1")));
        assert!(store.take_abort(&rob("Rob1")));
        assert!(!store.take_abort(&rob("Rob1")));
        assert!(!store.request_abort(&rob("Rob7")));
    }

    #[test]
    fn test_pending_goal_waits_for_idle() {
        let store = store();
        store.mark_busy(&rob("Rob0"), Point2::new(3.0, 0.0)).unwrap();
        store.set_pending_goal(&rob("Rob0"), Point2::new(0.0, 0.0));
        assert_eq!(store.take_pending_goal_if_idle(&rob("Rob0")), None);
        store.mark_idle(&rob("Rob0"));
        assert_eq!(
            store.take_pending_goal_if_idle(&rob("Rob0")),
            Some(Point2::new(0.0, 0.0))
        );
        assert_eq!(store.take_pending_goal_if_idle(&rob("Rob0")), None);
    }

    #[test]
    fn test_parking_keeps_first_home() {
        let store = store();
        let first = store.record_parking(
            &rob("Rob1"),
            Point2::new(7.0, 7.0),
            &rob("Rob0"),
            Point2::new(5.0, 5.0),
        );
        assert_eq!(first.home, Point2::new(5.0, 5.0));
        let second = store.record_parking(
            &rob("Rob1"),
            Point2::new(9.0, 7.0),
            &rob("Rob0"),
            Point2::new(7.0, 7.0),
        );
        assert_eq!(second.home, Point2::new(5.0, 5.0));
        assert_eq!(second.park, Point2::new(9.0, 7.0));
        assert_eq!(store.parked_by(&rob("Rob0")).len(), 1);
        assert!(store.parked_by(&rob("Rob1")).is_empty());
        assert_eq!(store.remove_parking(&rob("Rob1")), Some(second));
        assert_eq!(store.parking_record(&rob("Rob1")), None);
    }

    #[test]
    fn test_others_excludes_self() {
        let store = store();
        let others = store.others(&rob("Rob0"));
        assert_eq!(others, vec![(rob("Rob1"), Point2::new(5.0, 5.0))]);
        assert_eq!(store.idle_robots().len(), 2);
    }
}
