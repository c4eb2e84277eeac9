// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Path Planner
//!
//! A* over 8-connected cells of a [`CostMap`].
//!
//! - Step cost 1 cardinal, √2 diagonal, plus an optional soft cost
//!   `gain × cell_cost` and an optional proximity penalty.
//! - Heuristic: octile distance `max(dx,dy) + (√2−1)·min(dx,dy)`.
//! - Neighbours with cost at or above the block threshold are pruned.
//!
//! The search runs on the `pathfinding` crate with costs scaled to integer
//! milli-units. Step costs round up and the heuristic rounds down, which
//! keeps the scaled heuristic admissible and consistent. Among open cells
//! with equal f-score the crate pops the one with the highest g-score first.

use pathfinding::prelude::astar;
use serde::{Deserialize, Serialize};
use std::f64::consts::SQRT_2;
use std::sync::Arc;
use thiserror::Error;

use super::costmap::{CostMap, DEFAULT_BLOCK_THRESHOLD};
use super::geometry::{Cell, Point2};

const COST_SCALE: f64 = 1000.0;

const NEIGHBOURS: [(i32, i32); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (-1, 1),
    (1, -1),
    (1, 1),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub block_threshold: f32,
    /// Square rings scanned around each neighbour for the proximity penalty.
    /// Zero disables it.
    pub proximity_rings: u32,
    pub proximity_gain: f64,
    pub soft_cost_gain: Option<f64>,
    /// Added to the configured map inflation for the planning view.
    pub extra_inflation: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            block_threshold: DEFAULT_BLOCK_THRESHOLD,
            proximity_rings: 3,
            proximity_gain: 0.5,
            soft_cost_gain: None,
            extra_inflation: 0.0,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlanningError {
    #[error("start cell {0} is outside the grid")]
    StartOutOfBounds(Cell),

    #[error("goal cell {0} is outside the grid")]
    GoalOutOfBounds(Cell),

    #[error("goal cell {0} is blocked")]
    GoalBlocked(Cell),

    #[error("no path from {start} to {goal}")]
    NoPath { start: Cell, goal: Cell },
}

pub fn octile(a: Cell, b: Cell) -> f64 {
    let dx = f64::from((a.col - b.col).abs());
    let dy = f64::from((a.row - b.row).abs());
    dx.max(dy) + (SQRT_2 - 1.0) * dx.min(dy)
}

/// Cell sequence from start to goal inclusive, with its unscaled cost.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPath {
    pub cells: Vec<Cell>,
    pub cost: f64,
}

/// A* search over one cost grid.
pub struct GridPlanner<'a> {
    costs: &'a CostMap,
    config: PlannerConfig,
}

impl<'a> GridPlanner<'a> {
    pub fn new(costs: &'a CostMap, config: PlannerConfig) -> Self {
        Self { costs, config }
    }

    fn blocked(&self, cell: Cell) -> bool {
        self.costs.is_blocked(cell, self.config.block_threshold)
    }

    /// Chebyshev distance `d` in `1..=rings` to the nearest blocked in-bounds
    /// cell, scanning only the border of each ring.
    fn distance_to_blocked(&self, at: Cell) -> Option<u32> {
        let geometry = self.costs.geometry();
        for d in 1..=self.config.proximity_rings as i32 {
            let mut ring = (-d..=d)
                .flat_map(|o| {
                    [
                        Cell::new(at.col + o, at.row - d),
                        Cell::new(at.col + o, at.row + d),
                        Cell::new(at.col - d, at.row + o),
                        Cell::new(at.col + d, at.row + o),
                    ]
                })
                .filter(|c| geometry.contains(*c));
            if ring.any(|c| self.blocked(c)) {
                return Some(d as u32);
            }
        }
        None
    }

    fn step_cost(&self, from: Cell, to: Cell) -> f64 {
        let diagonal = from.col != to.col && from.row != to.row;
        let mut step = if diagonal { SQRT_2 } else { 1.0 };

        if let Some(gain) = self.config.soft_cost_gain {
            step += gain * f64::from(self.costs.cost(to).unwrap_or(1.0));
        }
        if self.config.proximity_rings > 0 && self.config.proximity_gain > 0.0 {
            if let Some(d) = self.distance_to_blocked(to) {
                let weight = f64::from(self.config.proximity_rings - d + 1);
                step += self.config.proximity_gain * weight;
            }
        }
        step
    }

    fn successors(&self, cell: &Cell) -> Vec<(Cell, u64)> {
        let geometry = self.costs.geometry();
        NEIGHBOURS
            .iter()
            .map(|(dc, dr)| Cell::new(cell.col + dc, cell.row + dr))
            .filter(|n| geometry.contains(*n) && !self.blocked(*n))
            .map(|n| (n, (self.step_cost(*cell, n) * COST_SCALE).ceil() as u64))
            .collect()
    }

    /// `Ok(None)` when the open set is exhausted. The start cell itself is
    /// never checked against the threshold; a robot may sit inside the
    /// inflation of an obstacle it just observed.
    pub fn search(&self, start: Cell, goal: Cell) -> Result<Option<GridPath>, PlanningError> {
        let geometry = self.costs.geometry();
        if !geometry.contains(start) {
            return Err(PlanningError::StartOutOfBounds(start));
        }
        if !geometry.contains(goal) {
            return Err(PlanningError::GoalOutOfBounds(goal));
        }
        if self.blocked(goal) {
            return Err(PlanningError::GoalBlocked(goal));
        }
        if start == goal {
            return Ok(Some(GridPath {
                cells: vec![start],
                cost: 0.0,
            }));
        }

        let found = astar(
            &start,
            |cell| self.successors(cell),
            |cell| (octile(*cell, goal) * COST_SCALE).floor() as u64,
            |cell| *cell == goal,
        );

        Ok(found.map(|(cells, scaled)| GridPath {
            cells,
            cost: scaled as f64 / COST_SCALE,
        }))
    }
}

/// Route in world coordinates together with the exact cost grid it was
/// planned on.
#[derive(Debug, Clone)]
pub struct PlannedPath {
    pub waypoints: Vec<Point2>,
    pub cells: Vec<Cell>,
    pub cost: f64,
    pub costmap: Arc<CostMap>,
}

impl PlannedPath {
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}

/// Plans between two world points on `view`. Both endpoints go through the
/// view's own geometry.
pub fn plan_route(
    view: Arc<CostMap>,
    start: Point2,
    goal: Point2,
    config: &PlannerConfig,
) -> Result<PlannedPath, PlanningError> {
    let geometry = view.geometry();
    let start_cell = geometry.point_to_cell(start);
    let goal_cell = geometry.point_to_cell(goal);

    let path = GridPlanner::new(&view, *config)
        .search(start_cell, goal_cell)?
        .ok_or(PlanningError::NoPath {
            start: start_cell,
            goal: goal_cell,
        })?;

    let waypoints = path
        .cells
        .iter()
        .map(|c| geometry.cell_to_world(*c))
        .collect();
    Ok(PlannedPath {
        waypoints,
        cells: path.cells,
        cost: path.cost,
        costmap: view,
    })
}
