// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Grid Geometry
//!
//! World ↔ cell conversion for the square, center-origin grid.
//!
//! World `(0, 0)` maps to the center cell `size / 2`. Every component that
//! turns meters into cells (map stamping, planner endpoints, executor
//! waypoint checks, parking candidates) goes through [`GridGeometry`], so a
//! single `(size, resolution)` pair defines the mapping at any moment.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Absorbs float noise in `coord / resolution` so that
/// `world_to_cell(cell_to_world(c)) == c` holds for every in-bounds cell.
const CELL_EPSILON: f64 = 1e-9;

/// A point in world coordinates, meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point2) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Point2 {
        Point2::new(self.x + dx, self.y + dy)
    }
}

impl From<(f64, f64)> for Point2 {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

impl From<[f64; 2]> for Point2 {
    fn from([x, y]: [f64; 2]) -> Self {
        Self::new(x, y)
    }
}

impl fmt::Display for Point2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

/// Integer grid coordinate. `col` follows world x, `row` follows world y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub col: i32,
    pub row: i32,
}

impl Cell {
    pub const fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    /// Chebyshev distance in cells.
    pub fn chebyshev(&self, other: Cell) -> i32 {
        (self.col - other.col).abs().max((self.row - other.row).abs())
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.col, self.row)
    }
}

/// Size and resolution of the square grid.
///
/// # Invariants
///
/// - `size` is odd, so the center is an integer cell.
/// - `resolution > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    size: usize,
    resolution: f64,
}

impl GridGeometry {
    /// Even sizes are bumped to the next odd size.
    pub fn new(size: usize, resolution: f64) -> Self {
        Self {
            size: size.max(1) | 1,
            resolution,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn center(&self) -> i32 {
        (self.size / 2) as i32
    }

    /// Distance from the center to the outermost cell origin, meters.
    pub fn half_extent(&self) -> f64 {
        f64::from(self.center()) * self.resolution
    }

    pub fn cell_count(&self) -> usize {
        self.size * self.size
    }

    /// `cell = floor(size/2 + coordinate/resolution)` on each axis.
    pub fn world_to_cell(&self, x: f64, y: f64) -> Cell {
        let c = f64::from(self.center());
        Cell::new(
            (c + x / self.resolution + CELL_EPSILON).floor() as i32,
            (c + y / self.resolution + CELL_EPSILON).floor() as i32,
        )
    }

    pub fn point_to_cell(&self, p: Point2) -> Cell {
        self.world_to_cell(p.x, p.y)
    }

    /// `coordinate = (cell - size/2) * resolution` on each axis.
    pub fn cell_to_world(&self, cell: Cell) -> Point2 {
        let c = self.center();
        Point2::new(
            f64::from(cell.col - c) * self.resolution,
            f64::from(cell.row - c) * self.resolution,
        )
    }

    pub fn contains(&self, cell: Cell) -> bool {
        let n = self.size as i32;
        (0..n).contains(&cell.col) && (0..n).contains(&cell.row)
    }

    /// Row-major index, `None` when out of bounds.
    pub fn index(&self, cell: Cell) -> Option<usize> {
        self.contains(cell)
            .then(|| cell.row as usize * self.size + cell.col as usize)
    }

    /// Nearest in-bounds cell.
    pub fn clamp(&self, cell: Cell) -> Cell {
        let max = self.size as i32 - 1;
        Cell::new(cell.col.clamp(0, max), cell.row.clamp(0, max))
    }

    /// Geometry grown by `pad` cells on every side. The world mapping of
    /// existing content is preserved: old cell `c` becomes `c + pad`.
    pub fn grown(&self, pad: usize) -> Self {
        Self::new(self.size + 2 * pad, self.resolution)
    }
}

/// Set of grid cells, e.g. the known-free parking cells or the ignored
/// static clutter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellSet(HashSet<Cell>);

impl CellSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, cell: Cell) -> bool {
        self.0.insert(cell)
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.0.contains(&cell)
    }

    /// Membership of the cell under `point`.
    pub fn contains_point(&self, geometry: &GridGeometry, point: Point2) -> bool {
        self.contains(geometry.point_to_cell(point))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Cells in `(row, col)` order.
    pub fn sorted(&self) -> Vec<Cell> {
        let mut cells: Vec<Cell> = self.0.iter().copied().collect();
        cells.sort_by_key(|c| (c.row, c.col));
        cells
    }
}

impl FromIterator<Cell> for CellSet {
    fn from_iter<I: IntoIterator<Item = Cell>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
