// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `fleet plan`: offline route query on the saved map.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use fleet_core::domain::fleet_config::FleetConfigManifest;
use fleet_core::domain::geometry::Point2;
use fleet_core::domain::planner::{plan_route, PlannedPath};
use fleet_core::infrastructure::MapStore;

use crate::fleet::{load_map, snapshot_path};

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Start as "x,y" in meters
    #[arg(value_parser = parse_point, allow_hyphen_values = true)]
    pub from: Point2,

    /// Goal as "x,y" in meters, or a configured location label
    #[arg(allow_hyphen_values = true)]
    pub to: String,

    /// Snapshot file (default: map.snapshot_path; empty map when unset)
    #[arg(long, value_name = "FILE")]
    pub map: Option<PathBuf>,

    /// Print the route as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn parse_point(raw: &str) -> Result<Point2, String> {
    let (x, y) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected \"x,y\", got {raw:?}"))?;
    let parse = |v: &str| v.trim().parse::<f64>().map_err(|e| format!("{v:?}: {e}"));
    Ok(Point2::new(parse(x)?, parse(y)?))
}

pub async fn execute(args: PlanArgs, config_override: Option<PathBuf>) -> Result<()> {
    let config = FleetConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;
    let path = route(&config, args.from, &args.to, args.map)?;

    if args.json {
        let body = serde_json::json!({
            "cost": path.cost,
            "waypoints": path.waypoints,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!(
        "{}",
        format!("Route with {} waypoints, cost {:.3}", path.len(), path.cost).bold()
    );
    for (i, p) in path.waypoints.iter().enumerate() {
        println!("  {i:>3}  {p}");
    }
    Ok(())
}

fn route(
    config: &FleetConfigManifest,
    from: Point2,
    to: &str,
    map: Option<PathBuf>,
) -> Result<PlannedPath> {
    let spec = &config.spec;
    let goal = match spec.fleet.location(to) {
        Some(p) => p,
        None => parse_point(to).map_err(|e| anyhow::anyhow!("Unknown destination: {e}"))?,
    };

    let store = snapshot_path(spec, map).map(MapStore::new);
    let mut grid = load_map(spec, store.as_ref())?;
    grid.ensure_covers(&[from, goal], spec.map.growth_margin);
    let view = Arc::new(grid.planning_view(spec.planner.extra_inflation));

    plan_route(view, from, goal, &spec.planner)
        .with_context(|| format!("No route from {from} to {goal}"))
}
