// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Map snapshot commands
//!
//! Commands: info, clear, export

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

use fleet_core::domain::fleet_config::FleetConfigManifest;
use fleet_core::domain::geometry::Cell;
use fleet_core::infrastructure::cell_list::{select_cells, write_cells, CellRect};
use fleet_core::infrastructure::MapStore;

use crate::fleet::{load_map, snapshot_path};

#[derive(Subcommand)]
pub enum MapCommand {
    /// Summarise the saved map snapshot
    Info {
        /// Snapshot file (default: map.snapshot_path)
        #[arg(long, value_name = "FILE")]
        map: Option<PathBuf>,
    },

    /// Erase every occupied cell and save the empty map
    Clear {
        #[arg(long, value_name = "FILE")]
        map: Option<PathBuf>,
    },

    /// Write free or occupied cells as a (col,row) list
    Export {
        #[arg(long, value_name = "FILE")]
        map: Option<PathBuf>,

        #[arg(value_enum)]
        which: CellKind,

        /// Limit to the cell rectangle COL0 ROW0 COL1 ROW1
        #[arg(long, num_args = 4, value_names = ["COL0", "ROW0", "COL1", "ROW1"], allow_hyphen_values = true)]
        rect: Option<Vec<i32>>,

        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum CellKind {
    /// Known-free cells for parking
    Free,
    /// Static clutter for the classifier to ignore
    Occupied,
}

pub async fn handle_command(command: MapCommand, config_override: Option<PathBuf>) -> Result<()> {
    let config = FleetConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;
    match command {
        MapCommand::Info { map } => info(&config, map),
        MapCommand::Clear { map } => clear(&config, map),
        MapCommand::Export {
            map,
            which,
            rect,
            output,
        } => export(&config, map, which, rect.as_deref(), output),
    }
}

fn store_for(config: &FleetConfigManifest, explicit: Option<PathBuf>) -> Result<MapStore> {
    snapshot_path(&config.spec, explicit)
        .map(MapStore::new)
        .context("No map snapshot given: pass --map or set spec.map.snapshot_path")
}

fn info(config: &FleetConfigManifest, explicit: Option<PathBuf>) -> Result<()> {
    let store = store_for(config, explicit)?;
    if !store.exists() {
        anyhow::bail!("Map snapshot {} does not exist", store.path().display());
    }
    let map = load_map(&config.spec, Some(&store))?;
    let geometry = map.geometry();
    let threshold = config.spec.planner.block_threshold;

    println!("{}", format!("Map snapshot {}", store.path().display()).bold());
    println!(
        "  Grid: {} x {} cells at {} m (±{:.2} m)",
        geometry.size(),
        geometry.size(),
        geometry.resolution(),
        geometry.half_extent()
    );
    println!("  Occupied cells: {}", map.occupancy().occupied_count());
    println!("  Blocked cost cells: {}", map.cost_layer().blocked_count(threshold));
    Ok(())
}

fn clear(config: &FleetConfigManifest, explicit: Option<PathBuf>) -> Result<()> {
    let store = store_for(config, explicit)?;
    let mut map = load_map(&config.spec, Some(&store))?;
    map.clear();
    store
        .save(&map.snapshot())
        .with_context(|| format!("Failed to save {}", store.path().display()))?;
    println!("{}", format!("✓ Map cleared: {}", store.path().display()).green());
    Ok(())
}

fn parse_rect(rect: Option<&[i32]>) -> Result<Option<CellRect>> {
    match rect {
        None => Ok(None),
        Some([c0, r0, c1, r1]) => Ok(Some(CellRect::new(Cell::new(*c0, *r0), Cell::new(*c1, *r1)))),
        Some(other) => anyhow::bail!("--rect takes four integers, got {}", other.len()),
    }
}

fn export(
    config: &FleetConfigManifest,
    explicit: Option<PathBuf>,
    which: CellKind,
    rect: Option<&[i32]>,
    output: PathBuf,
) -> Result<()> {
    let store = store_for(config, explicit)?;
    if !store.exists() {
        anyhow::bail!("Map snapshot {} does not exist", store.path().display());
    }
    let map = load_map(&config.spec, Some(&store))?;
    let cells = select_cells(map.occupancy(), which == CellKind::Occupied, parse_rect(rect)?);
    write_cells(&output, &cells)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!(
        "{}",
        format!("✓ {} cells written to {}", cells.len(), output.display()).green()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::infrastructure::cell_list::load_cells;

    #[test]
    fn test_rect_needs_four_values() {
        assert!(parse_rect(None).unwrap().is_none());
        let rect = parse_rect(Some(&[5, 9, 1, 2])).unwrap().unwrap();
        assert_eq!(rect.min, Cell::new(1, 2));
        assert_eq!(rect.max, Cell::new(5, 9));
        assert!(parse_rect(Some(&[1, 2])).is_err());
    }

    #[test]
    fn test_export_occupied_then_clear() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("map.bin");
        let mut config = FleetConfigManifest::default();
        config.spec.map.size = 21;

        let store = MapStore::new(&snapshot);
        let mut map = load_map(&config.spec, None).unwrap();
        map.stamp(1.0, 0.0);
        map.stamp(-1.0, 0.4);
        map.rebuild_costmap();
        store.save(&map.snapshot()).unwrap();

        let out = dir.path().join("occupied.txt");
        export(&config, Some(snapshot.clone()), CellKind::Occupied, None, out.clone()).unwrap();
        let cells = load_cells(&out).unwrap();
        assert_eq!(cells.len(), 2);
        assert!(cells.contains(map.world_to_cell(1.0, 0.0)));

        clear(&config, Some(snapshot.clone())).unwrap();
        let cleared = load_map(&config.spec, Some(&store)).unwrap();
        assert_eq!(cleared.occupancy().occupied_count(), 0);
    }
}
