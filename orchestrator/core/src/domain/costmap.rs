// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Cost layer derived from the occupancy grid.
//!
//! A [`CostMap`] holds one `f32` in `[0, 1]` per cell. Cells at or above the
//! block threshold are impassable for the planner. The layer is produced by
//! [`inflate`], which is a pure function of an occupancy snapshot, so two
//! calls on the same snapshot yield bit-identical maps.

use serde::{Deserialize, Serialize};

use super::geometry::{Cell, GridGeometry, Point2};
use super::grid::OccupancyGrid;

/// Default impassable threshold.
pub const DEFAULT_BLOCK_THRESHOLD: f32 = 0.99;

/// Shape stamped around each hit cell during inflation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Neighborhood {
    /// Chebyshev ball: every cell within `k` on both axes.
    #[default]
    Square,
    /// Euclidean ball of radius `k` cells.
    Disk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostMap {
    geometry: GridGeometry,
    costs: Vec<f32>,
}

impl CostMap {
    /// All-free cost layer.
    pub fn free(geometry: GridGeometry) -> Self {
        Self {
            geometry,
            costs: vec![0.0; geometry.cell_count()],
        }
    }

    /// Wraps raw costs; `None` when the length does not match the geometry.
    pub fn from_costs(geometry: GridGeometry, costs: Vec<f32>) -> Option<Self> {
        (costs.len() == geometry.cell_count()).then_some(Self { geometry, costs })
    }

    pub fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    pub fn costs(&self) -> &[f32] {
        &self.costs
    }

    pub fn cost(&self, cell: Cell) -> Option<f32> {
        self.geometry.index(cell).map(|i| self.costs[i])
    }

    pub fn cost_at(&self, point: Point2) -> Option<f32> {
        self.cost(self.geometry.point_to_cell(point))
    }

    /// Out-of-bounds cells count as blocked.
    pub fn is_blocked(&self, cell: Cell, threshold: f32) -> bool {
        self.cost(cell).is_none_or(|c| c >= threshold)
    }

    pub fn set(&mut self, cell: Cell, cost: f32) {
        if let Some(i) = self.geometry.index(cell) {
            self.costs[i] = cost.clamp(0.0, 1.0);
        }
    }

    pub fn blocked_count(&self, threshold: f32) -> usize {
        self.costs.iter().filter(|&&c| c >= threshold).count()
    }

    /// Every cell strictly below `threshold`, row-major.
    pub fn free_cells(&self, threshold: f32) -> impl Iterator<Item = Cell> + '_ {
        let size = self.geometry.size();
        self.costs
            .iter()
            .enumerate()
            .filter(move |(_, &c)| c < threshold)
            .map(move |(i, _)| Cell::new((i % size) as i32, (i / size) as i32))
    }

    /// Same layer padded with `pad` free cells on every side.
    pub fn grown(&self, pad: usize) -> Self {
        let old = self.geometry.size();
        let geometry = self.geometry.grown(pad);
        let size = geometry.size();
        let mut costs = vec![0.0; geometry.cell_count()];
        for row in 0..old {
            let src = row * old;
            let dst = (row + pad) * size + pad;
            costs[dst..dst + old].copy_from_slice(&self.costs[src..src + old]);
        }
        Self { geometry, costs }
    }
}

/// Inflates every hit cell by `radius_m`.
///
/// The neighborhood extends `k = max(1, round(radius_m / resolution))` cells.
/// A non-positive radius returns a 0/1 cast of the occupancy grid.
pub fn inflate(occupancy: &OccupancyGrid, radius_m: f64, neighborhood: Neighborhood) -> CostMap {
    let geometry = occupancy.geometry();
    let mut map = CostMap::free(geometry);

    if radius_m <= 0.0 {
        for (slot, &hit) in map.costs.iter_mut().zip(occupancy.cells()) {
            *slot = f32::from(hit);
        }
        return map;
    }

    let k = ((radius_m / geometry.resolution()).round() as i32).max(1);
    let max = geometry.size() as i32 - 1;
    let size = geometry.size();

    for hit in occupancy.occupied_cells() {
        for row in (hit.row - k).max(0)..=(hit.row + k).min(max) {
            for col in (hit.col - k).max(0)..=(hit.col + k).min(max) {
                if neighborhood == Neighborhood::Disk {
                    let (dc, dr) = (col - hit.col, row - hit.row);
                    if dc * dc + dr * dr > k * k {
                        continue;
                    }
                }
                map.costs[row as usize * size + col as usize] = 1.0;
            }
        }
    }
    map
}
