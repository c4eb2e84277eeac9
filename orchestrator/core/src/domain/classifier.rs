// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Sector Obstacle Classifier
//!
//! Folds one robot's latest scan into an eight-sector blocked/free profile
//! and tells another robot apart from static clutter.
//!
//! For each in-range point:
//!
//! 1. classify into a [`Sector`] with the dominance ratio;
//! 2. project to the world (robot position + offset);
//! 3. within `robot_proximity` of another robot → the sector is blocked and
//!    that robot is a blocking candidate (closest hit by local distance wins);
//! 4. else inside the ignored clutter set → dropped;
//! 5. else the sector is blocked.

use serde::{Deserialize, Serialize};

use super::geometry::{CellSet, GridGeometry, Point2};
use super::ports::SensorPoint;
use super::robot::RobotId;
use super::sector::{Sector, SectorMask, Slot};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Points at or beyond this range are ignored, meters.
    pub range_threshold: f64,
    pub dominance_ratio: f64,
    /// A world point this close to another robot is attributed to it.
    pub robot_proximity: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            range_threshold: 0.75,
            dominance_ratio: 1.0,
            robot_proximity: 1.0,
        }
    }
}

/// Another robot seen inside the range threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotHit {
    pub robot: RobotId,
    pub sector: Sector,
    /// Local planar distance of the closest point attributed to the robot.
    pub distance: f64,
}

/// Result of one classification pass.
///
/// The four slots report with a fixed priority: left before right, back
/// before front, front-left before front-right, back-left before
/// back-right. `seen` keeps the full eight-sector picture.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectorSummary {
    pub horizontal: Option<Sector>,
    pub vertical: Option<Sector>,
    pub front_diagonal: Option<Sector>,
    pub back_diagonal: Option<Sector>,
    pub seen: SectorMask,
    pub nearest_robot: Option<RobotHit>,
}

impl SectorSummary {
    fn from_seen(seen: SectorMask, nearest_robot: Option<RobotHit>) -> Self {
        let pick = |first: Sector, second: Sector| {
            if seen.contains(first) {
                Some(first)
            } else if seen.contains(second) {
                Some(second)
            } else {
                None
            }
        };
        Self {
            horizontal: pick(Sector::Left, Sector::Right),
            vertical: pick(Sector::Back, Sector::Front),
            front_diagonal: pick(Sector::FrontLeft, Sector::FrontRight),
            back_diagonal: pick(Sector::BackLeft, Sector::BackRight),
            seen,
            nearest_robot,
        }
    }

    pub fn slot(&self, slot: Slot) -> Option<Sector> {
        match slot {
            Slot::Horizontal => self.horizontal,
            Slot::Vertical => self.vertical,
            Slot::FrontDiagonal => self.front_diagonal,
            Slot::BackDiagonal => self.back_diagonal,
        }
    }

    /// Slot status as reported, `"Free"` when empty.
    pub fn slot_label(&self, slot: Slot) -> &'static str {
        self.slot(slot).map_or("Free", Sector::as_str)
    }

    pub fn is_all_free(&self) -> bool {
        self.seen.is_empty()
    }

    /// Clear when the sector is not reported in its slot and is not the
    /// sector of the nearest blocking robot.
    pub fn is_path_clear(&self, sector: Sector) -> bool {
        if self.slot(sector.slot()) == Some(sector) {
            return false;
        }
        self.nearest_robot
            .as_ref()
            .is_none_or(|hit| hit.sector != sector)
    }

    /// A direction is free when it and its two neighbours are clear.
    pub fn is_direction_free(&self, sector: Sector) -> bool {
        sector.triplet().iter().all(|s| self.is_path_clear(*s))
    }

    /// First blocked sector along a motion `(dx, dy)` whose near-zero axes
    /// are already zeroed: the horizontal side, the vertical side, then the
    /// diagonal when both axes move.
    pub fn blocking_sector_for(&self, dx: f64, dy: f64) -> Option<Sector> {
        let horizontal = (dx != 0.0).then(|| if dx > 0.0 { Sector::Left } else { Sector::Right });
        let vertical = (dy != 0.0).then(|| if dy > 0.0 { Sector::Back } else { Sector::Front });
        let diagonal = match (horizontal, vertical) {
            (Some(_), Some(_)) => Some(match (dy < 0.0, dx > 0.0) {
                (true, true) => Sector::FrontLeft,
                (true, false) => Sector::FrontRight,
                (false, true) => Sector::BackLeft,
                (false, false) => Sector::BackRight,
            }),
            _ => None,
        };
        [horizontal, vertical, diagonal]
            .into_iter()
            .flatten()
            .find(|s| self.seen.contains(*s))
    }
}

pub struct SectorClassifier<'a> {
    config: ClassifierConfig,
    geometry: GridGeometry,
    ignored: &'a CellSet,
}

impl<'a> SectorClassifier<'a> {
    pub fn new(config: ClassifierConfig, geometry: GridGeometry, ignored: &'a CellSet) -> Self {
        Self {
            config,
            geometry,
            ignored,
        }
    }

    /// `others` are the known positions of every other robot; an entry for
    /// `robot` itself is skipped.
    pub fn classify(
        &self,
        robot: &RobotId,
        position: Point2,
        points: &[SensorPoint],
        others: &[(RobotId, Point2)],
    ) -> SectorSummary {
        let mut seen = SectorMask::default();
        let mut nearest: Option<RobotHit> = None;

        for point in points {
            let range = point.effective_range();
            if !range.is_finite() || range >= self.config.range_threshold {
                continue;
            }
            let sector = Sector::classify(point.x, point.y, self.config.dominance_ratio);
            let world = position.offset(point.x, point.y);

            if let Some(other) = self.closest_robot(robot, world, others) {
                let distance = point.x.hypot(point.y);
                if nearest.as_ref().is_none_or(|hit| distance < hit.distance) {
                    nearest = Some(RobotHit {
                        robot: other.clone(),
                        sector,
                        distance,
                    });
                }
                seen.insert(sector);
                continue;
            }

            if self.ignored.contains_point(&self.geometry, world) {
                continue;
            }
            seen.insert(sector);
        }

        SectorSummary::from_seen(seen, nearest)
    }

    /// Closest other robot within `robot_proximity` of `world`.
    pub fn closest_robot<'o>(
        &self,
        robot: &RobotId,
        world: Point2,
        others: &'o [(RobotId, Point2)],
    ) -> Option<&'o RobotId> {
        others
            .iter()
            .filter(|(id, _)| id != robot)
            .map(|(id, at)| (id, at.distance_to(world)))
            .filter(|(_, d)| *d <= self.config.robot_proximity)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }
}
