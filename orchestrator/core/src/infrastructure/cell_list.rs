// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Plain-text cell lists, one `(col,row)` per line.
//!
//! Two lists feed the fleet: the known-free cells a parked robot may stop
//! on, and the static clutter the classifier ignores. Both are exported
//! from a saved map with `fleet map export`.

use std::fmt::Write as _;
use std::path::Path;
use tracing::{info, warn};

use crate::domain::geometry::{Cell, CellSet};
use crate::domain::grid::OccupancyGrid;

/// Parses `(col,row)`; whitespace around either number is allowed.
pub fn parse_cell_line(line: &str) -> Option<Cell> {
    let inner = line.trim().strip_prefix('(')?.strip_suffix(')')?;
    let (col, row) = inner.split_once(',')?;
    Some(Cell::new(col.trim().parse().ok()?, row.trim().parse().ok()?))
}

/// Malformed lines are skipped.
pub fn parse_cells(text: &str) -> CellSet {
    text.lines().filter_map(parse_cell_line).collect()
}

pub fn load_cells(path: impl AsRef<Path>) -> std::io::Result<CellSet> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_cells(&text))
}

/// A missing or unreadable list yields an empty set and a warning.
pub fn load_optional(path: Option<&str>, what: &str) -> CellSet {
    let Some(path) = path else {
        return CellSet::new();
    };
    match load_cells(path) {
        Ok(cells) => {
            info!(path, count = cells.len(), "Loaded {} cells", what);
            cells
        }
        Err(e) => {
            warn!(path, error = %e, "Could not read {} cell list; using an empty set", what);
            CellSet::new()
        }
    }
}

/// Row-major order, one cell per line.
pub fn format_cells<'a>(cells: impl IntoIterator<Item = &'a Cell>) -> String {
    let mut out = String::new();
    for cell in cells {
        let _ = writeln!(out, "({},{})", cell.col, cell.row);
    }
    out
}

pub fn write_cells(path: impl AsRef<Path>, cells: &CellSet) -> std::io::Result<()> {
    std::fs::write(path, format_cells(cells.sorted().iter()))
}

/// Inclusive cell rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRect {
    pub min: Cell,
    pub max: Cell,
}

impl CellRect {
    /// Normalises corner order.
    pub fn new(a: Cell, b: Cell) -> Self {
        Self {
            min: Cell::new(a.col.min(b.col), a.row.min(b.row)),
            max: Cell::new(a.col.max(b.col), a.row.max(b.row)),
        }
    }

    pub fn contains(&self, cell: Cell) -> bool {
        (self.min.col..=self.max.col).contains(&cell.col)
            && (self.min.row..=self.max.row).contains(&cell.row)
    }
}

/// Cells of `grid` whose occupancy equals `occupied`, optionally limited to
/// `rect`.
pub fn select_cells(grid: &OccupancyGrid, occupied: bool, rect: Option<CellRect>) -> CellSet {
    let size = grid.geometry().size() as i32;
    (0..size)
        .flat_map(|row| (0..size).map(move |col| Cell::new(col, row)))
        .filter(|c| grid.is_occupied(*c) == occupied)
        .filter(|c| rect.is_none_or(|r| r.contains(*c)))
        .collect()
}
