// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Wires a [`FleetContext`] from a loaded manifest.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use fleet_core::application::FleetContext;
use fleet_core::domain::fleet_config::{FleetConfigManifest, FleetConfigSpec};
use fleet_core::domain::geometry::Point2;
use fleet_core::domain::grid::GridMap;
use fleet_core::domain::robot::RobotId;
use fleet_core::infrastructure::cell_list::load_optional;
use fleet_core::infrastructure::{FleetStateStore, MapStore, SimWorld};

/// Snapshot path from `--map`, else from the manifest.
pub fn snapshot_path(spec: &FleetConfigSpec, explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| spec.map.snapshot_path.as_ref().map(PathBuf::from))
}

/// Grid from the `map` section, restored from its snapshot when one exists.
pub fn load_map(spec: &FleetConfigSpec, snapshot: Option<&MapStore>) -> Result<GridMap> {
    let mut map = GridMap::new(spec.map.geometry(), spec.map.settings());
    match snapshot {
        Some(store) if store.exists() => store
            .load_into(&mut map)
            .with_context(|| format!("Failed to load map snapshot {}", store.path().display()))?,
        Some(store) => info!(path = %store.path().display(), "No map snapshot yet; starting empty"),
        None => {}
    }
    Ok(map)
}

/// Simulated fleet with every roster robot at its start pose.
pub fn build_sim_fleet(config: &FleetConfigManifest) -> Result<(FleetContext, SimWorld)> {
    let spec = &config.spec;
    let sim = spec.simulation.clone().unwrap_or_default();
    let world = SimWorld::from_config(&sim, spec.executor.sensor_ids(), spec.map.resolution);

    let robots: Vec<(RobotId, Point2)> = spec
        .fleet
        .robots
        .iter()
        .map(|r| (RobotId::normalized(&r.id), Point2::from(r.start)))
        .collect();
    if robots.is_empty() {
        warn!("Fleet roster is empty; every move will be rejected");
    }
    for (id, start) in &robots {
        world.add_robot(id.clone(), *start);
    }

    let map_store = snapshot_path(spec, None).map(MapStore::new);
    let map = load_map(spec, map_store.as_ref())?;
    let known_free = load_optional(spec.parking.known_free_path.as_deref(), "known-free");
    let ignored = load_optional(spec.classifier.ignored_cells_path.as_deref(), "ignored");
    if known_free.is_empty() {
        warn!("No known-free cells loaded; parking requests will fail");
    }

    let mut ctx = FleetContext::new(
        spec.clone(),
        map,
        FleetStateStore::with_robots(robots),
        Arc::new(world.clone()),
    )
    .with_known_free(known_free)
    .with_ignored_cells(ignored);
    if let Some(store) = map_store {
        ctx = ctx.with_map_store(store);
    }
    Ok((ctx, world))
}
