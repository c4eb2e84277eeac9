// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared handles every mission task works against.

use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::classifier::{SectorClassifier, SectorSummary};
use crate::domain::events::MapEvent;
use crate::domain::fleet_config::FleetConfigSpec;
use crate::domain::geometry::{CellSet, GridGeometry, Point2};
use crate::domain::grid::GridMap;
use crate::domain::ports::{PortError, RobotConnector, RobotPort, SensorId, SensorPoint};
use crate::domain::robot::RobotId;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::map_store::MapStore;
use crate::infrastructure::obstacle_decisions::ObstacleDecisionService;
use crate::infrastructure::repositories::FleetStateStore;

/// Cloned into every executor, resolver and the supervisor.
#[derive(Clone)]
pub struct FleetContext {
    pub map: Arc<RwLock<GridMap>>,
    pub store: FleetStateStore,
    pub events: EventBus,
    pub decisions: ObstacleDecisionService,
    pub connector: Arc<dyn RobotConnector>,
    pub config: Arc<FleetConfigSpec>,
    /// Clutter the classifier never treats as an obstacle.
    pub ignored_cells: Arc<CellSet>,
    /// Cells a parking candidate must land on.
    pub known_free: Arc<CellSet>,
    pub map_store: Option<MapStore>,
}

impl FleetContext {
    pub fn new(
        config: FleetConfigSpec,
        map: GridMap,
        store: FleetStateStore,
        connector: Arc<dyn RobotConnector>,
    ) -> Self {
        Self {
            map: Arc::new(RwLock::new(map)),
            store,
            events: EventBus::with_default_capacity(),
            decisions: ObstacleDecisionService::new(),
            connector,
            config: Arc::new(config),
            ignored_cells: Arc::new(CellSet::new()),
            known_free: Arc::new(CellSet::new()),
            map_store: None,
        }
    }

    pub fn with_ignored_cells(mut self, cells: CellSet) -> Self {
        self.ignored_cells = Arc::new(cells);
        self
    }

    pub fn with_known_free(mut self, cells: CellSet) -> Self {
        self.known_free = Arc::new(cells);
        self
    }

    pub fn with_map_store(mut self, store: MapStore) -> Self {
        self.map_store = Some(store);
        self
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn geometry(&self) -> GridGeometry {
        self.map.read().geometry()
    }

    pub fn sensors(&self) -> Vec<SensorId> {
        self.config.executor.sensor_ids()
    }

    /// Concatenated returns of every configured sensor.
    pub async fn sense(&self, port: &dyn RobotPort) -> Result<Vec<SensorPoint>, PortError> {
        let mut points = Vec::new();
        for sensor in self.sensors() {
            points.extend(port.read_scan(&sensor).await?);
        }
        Ok(points)
    }

    pub fn classify(&self, robot: &RobotId, position: Point2, points: &[SensorPoint]) -> SectorSummary {
        let others = self.store.others(robot);
        let geometry = self.geometry();
        SectorClassifier::new(self.config.classifier.thresholds, geometry, &self.ignored_cells)
            .classify(robot, position, points, &others)
    }

    /// Stamps the static part of a scan into the shared grid and rebuilds
    /// the cost layer. Points attributed to another robot are left out.
    /// Returns false when the map is frozen.
    pub fn fold_scan(&self, robot: &RobotId, position: Point2, points: &[SensorPoint]) -> bool {
        let others = self.store.others(robot);
        let rebuilds = {
            let mut map = self.map.write();
            if map.is_frozen() {
                return false;
            }
            let classifier =
                SectorClassifier::new(self.config.classifier.thresholds, map.geometry(), &self.ignored_cells);
            let statics: Vec<SensorPoint> = points
                .iter()
                .filter(|p| {
                    classifier
                        .closest_robot(robot, position.offset(p.x, p.y), &others)
                        .is_none()
                })
                .copied()
                .collect();
            map.stamp_scan(position, &statics);
            map.rebuild_costmap()
        };
        self.maybe_autosave(rebuilds);
        true
    }

    /// Grows the grid to cover `points`. Publishes `MapGrown` when it did.
    pub fn ensure_covers(&self, points: &[Point2]) -> bool {
        let (grew, old_size, new_size) = {
            let mut map = self.map.write();
            if map.is_frozen() {
                return false;
            }
            let old_size = map.geometry().size();
            let grew = map.ensure_covers(points, self.config.map.growth_margin);
            (grew, old_size, map.geometry().size())
        };
        if grew {
            self.events.publish_map_event(MapEvent::MapGrown {
                old_size,
                new_size,
                grown_at: Utc::now(),
            });
        }
        grew
    }

    fn maybe_autosave(&self, rebuilds: u64) {
        let Some(store) = self.map_store.clone() else {
            return;
        };
        let every = self.config.map.autosave_every;
        if every == 0 || rebuilds % every != 0 {
            return;
        }
        let snapshot = self.map.read().snapshot();
        let events = self.events.clone();
        // Blocking file I/O; the tick that triggered it does not wait.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn_blocking(move || match store.save(&snapshot) {
                Ok(()) => {
                    debug!(rebuilds, path = %store.path().display(), "Map autosaved");
                    events.publish_map_event(MapEvent::MapSaved {
                        path: store.path().display().to_string(),
                        rebuilds,
                        saved_at: Utc::now(),
                    });
                }
                Err(e) => warn!(error = %e, "Map autosave failed"),
            });
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::domain::fleet_config::FleetConfigSpec;
    use crate::infrastructure::sim::{SimSettings, SimWorld};

    /// Fast ticks, a free map and everything within 5 m known free.
    pub fn fast_spec() -> FleetConfigSpec {
        let mut spec = FleetConfigSpec::default();
        spec.executor.tick_interval_ms = 1;
        spec.executor.obstacle_poll_ms = 1;
        spec.parking.tick_interval_ms = 1;
        spec.supervisor.tick_interval_ms = 1;
        spec.planner.proximity_rings = 0;
        spec
    }

    pub fn free_box(geometry: &GridGeometry, half: f64) -> CellSet {
        let lo = geometry.world_to_cell(-half, -half);
        let hi = geometry.world_to_cell(half, half);
        (lo.row..=hi.row)
            .flat_map(|row| (lo.col..=hi.col).map(move |col| crate::domain::geometry::Cell::new(col, row)))
            .collect()
    }

    pub fn sim_context(spec: FleetConfigSpec, robots: &[(&str, Point2)]) -> (FleetContext, SimWorld) {
        let world = SimWorld::new(SimSettings::default());
        for (id, at) in robots {
            world.add_robot(RobotId::new(*id), *at);
        }
        let store = FleetStateStore::with_robots(robots.iter().map(|(id, at)| (RobotId::new(*id), *at)));
        let map = GridMap::new(spec.map.geometry(), spec.map.settings());
        let geometry = map.geometry();
        let ctx = FleetContext::new(spec, map, store, Arc::new(world.clone()))
            .with_known_free(free_box(&geometry, 5.0));
        (ctx, world)
    }
}
