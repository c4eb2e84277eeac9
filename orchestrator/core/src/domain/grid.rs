// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Grid Map Manager
//!
//! Owns the shared occupancy grid and its inflated cost layer.
//!
//! ## Invariants
//!
//! - Occupancy and cost layer always share one [`GridGeometry`].
//! - The grid only grows, symmetrically, padding with free cells; existing
//!   hits keep their world position.
//! - [`GridMap::planning_view`] never mutates the shared layers.
//!
//! The map is shared across mission tasks as `Arc<parking_lot::RwLock<GridMap>>`.
//! Every mutation here is synchronous, so a write lock is never held across
//! an `.await`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::costmap::{inflate, CostMap, Neighborhood};
use super::geometry::{Cell, GridGeometry, Point2};
use super::ports::SensorPoint;

/// Binary occupancy: 0 free, 1 hit. Row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancyGrid {
    geometry: GridGeometry,
    cells: Vec<u8>,
}

impl OccupancyGrid {
    pub fn new(geometry: GridGeometry) -> Self {
        Self {
            geometry,
            cells: vec![0; geometry.cell_count()],
        }
    }

    /// Wraps raw cells; `None` when the length does not match the geometry.
    pub fn from_cells(geometry: GridGeometry, cells: Vec<u8>) -> Option<Self> {
        (cells.len() == geometry.cell_count()).then(|| Self {
            geometry,
            cells: cells.into_iter().map(|c| u8::from(c != 0)).collect(),
        })
    }

    pub fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub fn is_occupied(&self, cell: Cell) -> bool {
        self.geometry
            .index(cell)
            .is_some_and(|i| self.cells[i] != 0)
    }

    /// Returns false when the cell is out of bounds.
    pub fn mark(&mut self, cell: Cell) -> bool {
        match self.geometry.index(cell) {
            Some(i) => {
                self.cells[i] = 1;
                true
            }
            None => false,
        }
    }

    pub fn occupied_cells(&self) -> impl Iterator<Item = Cell> + '_ {
        let size = self.geometry.size();
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, &c)| c != 0)
            .map(move |(i, _)| Cell::new((i % size) as i32, (i / size) as i32))
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c != 0).count()
    }

    pub fn grown(&self, pad: usize) -> Self {
        let old = self.geometry.size();
        let geometry = self.geometry.grown(pad);
        let size = geometry.size();
        let mut cells = vec![0; geometry.cell_count()];
        for row in 0..old {
            let src = row * old;
            let dst = (row + pad) * size + pad;
            cells[dst..dst + old].copy_from_slice(&self.cells[src..src + old]);
        }
        Self { geometry, cells }
    }

    pub fn clear(&mut self) {
        self.cells.fill(0);
    }
}

/// Inflation and freeze settings of the shared map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapSettings {
    pub inflation_radius: f64,
    pub neighborhood: Neighborhood,
    /// Live scans are never folded in and the grid never grows.
    pub freeze: bool,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            inflation_radius: 0.10,
            neighborhood: Neighborhood::Square,
            freeze: false,
        }
    }
}

/// Serialisable copy of both layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSnapshot {
    pub resolution: f64,
    pub size: usize,
    pub occupancy: Vec<u8>,
    pub costs: Vec<f32>,
}

#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("snapshot size {size} is not a valid odd grid size")]
    InvalidSize { size: usize },

    #[error("snapshot resolution {0} must be positive")]
    InvalidResolution(f64),

    #[error("snapshot layer has {actual} cells, expected {expected}")]
    LayerMismatch { expected: usize, actual: usize },
}

/// Occupancy grid plus cost layer sharing one geometry.
#[derive(Debug, Clone)]
pub struct GridMap {
    occupancy: OccupancyGrid,
    cost: CostMap,
    settings: MapSettings,
    rebuilds: u64,
}

impl GridMap {
    pub fn new(geometry: GridGeometry, settings: MapSettings) -> Self {
        Self {
            occupancy: OccupancyGrid::new(geometry),
            cost: CostMap::free(geometry),
            settings,
            rebuilds: 0,
        }
    }

    pub fn geometry(&self) -> GridGeometry {
        self.occupancy.geometry()
    }

    pub fn settings(&self) -> MapSettings {
        self.settings
    }

    pub fn is_frozen(&self) -> bool {
        self.settings.freeze
    }

    pub fn set_frozen(&mut self, freeze: bool) {
        self.settings.freeze = freeze;
    }

    pub fn occupancy(&self) -> &OccupancyGrid {
        &self.occupancy
    }

    pub fn cost_layer(&self) -> &CostMap {
        &self.cost
    }

    /// Cost-layer rebuilds since construction.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    pub fn world_to_cell(&self, x: f64, y: f64) -> Cell {
        self.geometry().world_to_cell(x, y)
    }

    pub fn cell_to_world(&self, cell: Cell) -> Point2 {
        self.geometry().cell_to_world(cell)
    }

    /// Marks the cell under `(x, y)`. No-op outside the grid.
    pub fn stamp(&mut self, x: f64, y: f64) -> bool {
        let cell = self.world_to_cell(x, y);
        self.occupancy.mark(cell)
    }

    /// Folds one scan into the occupancy grid. Scan offsets are in the
    /// robot frame and are added to `origin` without rotation. Returns the
    /// number of points that landed inside the grid.
    pub fn stamp_scan(&mut self, origin: Point2, points: &[SensorPoint]) -> usize {
        points
            .iter()
            .filter(|p| p.x.is_finite() && p.y.is_finite())
            .filter(|p| self.stamp(origin.x + p.x, origin.y + p.y))
            .count()
    }

    pub fn inflate(&self, radius: f64) -> CostMap {
        inflate(&self.occupancy, radius, self.settings.neighborhood)
    }

    /// Replaces the cost layer with the configured inflation. Returns the
    /// new rebuild count.
    pub fn rebuild_costmap(&mut self) -> u64 {
        self.cost = self.inflate(self.settings.inflation_radius);
        self.rebuilds += 1;
        self.rebuilds
    }

    /// Grows the grid so every point plus `margin` fits inside the half
    /// extent. Returns true when the grid grew.
    pub fn ensure_covers(&mut self, points: &[Point2], margin: f64) -> bool {
        let geometry = self.geometry();
        let need = points
            .iter()
            .map(|p| p.x.abs().max(p.y.abs()))
            .fold(0.0_f64, f64::max)
            + margin;
        if need <= geometry.half_extent() {
            return false;
        }

        let new_size = 2 * (need / geometry.resolution()).ceil() as usize + 1;
        if new_size <= geometry.size() {
            return false;
        }
        let pad = (new_size - geometry.size()) / 2;
        self.occupancy = self.occupancy.grown(pad);
        self.cost = self.cost.grown(pad);
        tracing::info!(
            old_size = geometry.size(),
            new_size = self.geometry().size(),
            "Grid grown to cover requested points"
        );
        true
    }

    /// Cost layer built from a snapshot of occupancy with the configured
    /// radius plus `extra_inflation`. The shared layers are untouched.
    pub fn planning_view(&self, extra_inflation: f64) -> CostMap {
        self.inflate(self.settings.inflation_radius + extra_inflation.max(0.0))
    }

    pub fn clear(&mut self) {
        self.occupancy.clear();
        self.cost = CostMap::free(self.geometry());
    }

    pub fn snapshot(&self) -> MapSnapshot {
        let geometry = self.geometry();
        MapSnapshot {
            resolution: geometry.resolution(),
            size: geometry.size(),
            occupancy: self.occupancy.cells().to_vec(),
            costs: self.cost.costs().to_vec(),
        }
    }

    /// Replaces both layers and the derived geometry.
    pub fn restore(&mut self, snapshot: MapSnapshot) -> Result<(), GridError> {
        if snapshot.size == 0 || snapshot.size % 2 == 0 {
            return Err(GridError::InvalidSize { size: snapshot.size });
        }
        if snapshot.resolution.is_nan() || snapshot.resolution <= 0.0 {
            return Err(GridError::InvalidResolution(snapshot.resolution));
        }
        let geometry = GridGeometry::new(snapshot.size, snapshot.resolution);
        let expected = geometry.cell_count();
        for actual in [snapshot.occupancy.len(), snapshot.costs.len()] {
            if actual != expected {
                return Err(GridError::LayerMismatch { expected, actual });
            }
        }
        let occupancy = OccupancyGrid::from_cells(geometry, snapshot.occupancy)
            .ok_or(GridError::LayerMismatch { expected, actual: 0 })?;
        let cost = CostMap::from_costs(geometry, snapshot.costs)
            .ok_or(GridError::LayerMismatch { expected, actual: 0 })?;
        self.occupancy = occupancy;
        self.cost = cost;
        Ok(())
    }
}
