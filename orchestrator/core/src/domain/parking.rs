// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Parking protocol rules: escape priorities, candidate geometry and the
//! record kept while a robot is displaced.

use serde::{Deserialize, Serialize};

use super::classifier::SectorSummary;
use super::geometry::{CellSet, GridGeometry, Point2};
use super::robot::RobotId;
use super::sector::Sector;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParkingConfig {
    /// Distance from the blocking robot to a candidate, per axis.
    pub safe_margin: f64,
    /// Arrival tolerance per axis.
    pub reach_tolerance: f64,
    /// Dominance ratio used to turn a motion vector into a sector.
    pub motion_ratio: f64,
    /// Both axes above this move diagonally.
    pub diagonal_threshold: f64,
    /// Bound on drive ticks for one parking or return move.
    pub max_ticks: u32,
}

impl Default for ParkingConfig {
    fn default() -> Self {
        Self {
            safe_margin: 2.0,
            reach_tolerance: 0.12,
            motion_ratio: 1.5,
            diagonal_threshold: 0.05,
            max_ticks: 2_000,
        }
    }
}

/// Escape directions to try, given where the blocking robot was seen.
/// Diagonals come first and the blocked side itself is never offered.
pub fn escape_priorities(block: Sector) -> [Sector; 5] {
    use Sector::*;
    match block {
        Front => [BackLeft, BackRight, Left, Right, Back],
        Back => [FrontLeft, FrontRight, Left, Right, Front],
        Left => [BackLeft, FrontLeft, Back, Front, Right],
        Right => [BackRight, FrontRight, Back, Front, Left],
        FrontLeft => [BackRight, Right, Back, FrontRight, Left],
        FrontRight => [BackLeft, Left, Back, FrontLeft, Right],
        BackLeft => [FrontRight, Right, Front, BackRight, Left],
        BackRight => [FrontLeft, Left, Front, BackLeft, Right],
    }
}

/// Point `margin` away from `from` in `direction`, per axis.
pub fn candidate_point(from: Point2, direction: Sector, margin: f64) -> Point2 {
    let (ox, oy) = direction.offset();
    from.offset(ox * margin, oy * margin)
}

/// An accepted park target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParkingSpot {
    pub direction: Sector,
    pub target: Point2,
}

/// First direction in priority order whose triplet is free for the
/// blocking robot and whose candidate cell is known to be free. An empty
/// known-free set rejects every candidate.
pub fn choose_spot(
    summary: &SectorSummary,
    from: Point2,
    cause: Sector,
    known_free: &CellSet,
    geometry: &GridGeometry,
    margin: f64,
) -> Option<ParkingSpot> {
    escape_priorities(cause).into_iter().find_map(|direction| {
        if !summary.is_direction_free(direction) {
            tracing::debug!(%direction, "Escape direction not clear");
            return None;
        }
        let target = candidate_point(from, direction, margin);
        if !known_free.contains_point(geometry, target) {
            tracing::debug!(%direction, %target, "Candidate outside known-free cells");
            return None;
        }
        Some(ParkingSpot { direction, target })
    })
}

/// A robot displaced to clear a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkingRecord {
    pub robot: RobotId,
    /// Position before the first displacement.
    pub home: Point2,
    pub park: Point2,
    pub requested_by: RobotId,
}
