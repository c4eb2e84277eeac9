// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use fleet_core::domain::costmap::{inflate, Neighborhood};
use fleet_core::domain::geometry::{Cell, GridGeometry, Point2};
use fleet_core::domain::grid::{GridMap, MapSettings};
use fleet_core::domain::planner::{octile, GridPlanner, PlannerConfig};
use proptest::prelude::*;

const SIZE: usize = 41;
const RES: f64 = 0.2;

fn cell_strategy() -> impl Strategy<Value = Cell> {
    (0..SIZE as i32, 0..SIZE as i32).prop_map(|(col, row)| Cell::new(col, row))
}

fn plain() -> PlannerConfig {
    PlannerConfig {
        proximity_rings: 0,
        ..PlannerConfig::default()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every in-grid cell maps to its world center and back.
    #[test]
    fn cell_world_round_trip(cell in cell_strategy()) {
        let geometry = GridGeometry::new(SIZE, RES);
        let world = geometry.cell_to_world(cell);
        prop_assert_eq!(geometry.world_to_cell(world.x, world.y), cell);
    }

    /// Zero-radius inflation is the occupancy grid cast to 0/1.
    #[test]
    fn zero_radius_inflation_is_binary(hits in prop::collection::vec(cell_strategy(), 0..40)) {
        let mut map = GridMap::new(GridGeometry::new(SIZE, RES), MapSettings::default());
        for cell in &hits {
            let p = map.cell_to_world(*cell);
            map.stamp(p.x, p.y);
        }
        let costs = inflate(map.occupancy(), 0.0, Neighborhood::Square);
        for (cost, hit) in costs.costs().iter().zip(map.occupancy().cells()) {
            prop_assert_eq!(*cost, f32::from(*hit));
        }
    }

    /// Growing the grid keeps every stamped world point occupied.
    #[test]
    fn growth_preserves_occupancy(
        hits in prop::collection::vec(cell_strategy(), 1..30),
        far in 5.0f64..40.0,
    ) {
        let mut map = GridMap::new(GridGeometry::new(SIZE, RES), MapSettings::default());
        let points: Vec<Point2> = hits.iter().map(|c| map.cell_to_world(*c)).collect();
        for p in &points {
            map.stamp(p.x, p.y);
        }
        let before = map.occupancy().occupied_count();

        prop_assert!(map.ensure_covers(&[Point2::new(far, -far)], 1.0));
        prop_assert_eq!(map.occupancy().occupied_count(), before);
        for p in &points {
            prop_assert!(map.occupancy().is_occupied(map.world_to_cell(p.x, p.y)));
        }
    }

    /// On a free grid the path joins the endpoints through 8-neighbours at
    /// octile cost.
    #[test]
    fn free_grid_path_is_octile(start in cell_strategy(), goal in cell_strategy()) {
        let map = GridMap::new(GridGeometry::new(SIZE, RES), MapSettings::default());
        let costs = map.planning_view(0.0);
        let path = GridPlanner::new(&costs, plain()).search(start, goal).unwrap().unwrap();

        prop_assert_eq!(path.cells.first().copied(), Some(start));
        prop_assert_eq!(path.cells.last().copied(), Some(goal));
        for pair in path.cells.windows(2) {
            prop_assert_eq!(pair[0].chebyshev(pair[1]), 1);
        }
        let lower = octile(start, goal);
        prop_assert!(path.cost + 1e-9 >= lower);
        prop_assert!(path.cost <= lower + 0.001 * path.cells.len() as f64);
    }

    /// Two planning views of the same snapshot are identical and leave the
    /// shared layers untouched.
    #[test]
    fn planning_view_is_pure(hits in prop::collection::vec(cell_strategy(), 0..30), extra in 0.0f64..0.6) {
        let mut map = GridMap::new(GridGeometry::new(SIZE, RES), MapSettings::default());
        for cell in &hits {
            let p = map.cell_to_world(*cell);
            map.stamp(p.x, p.y);
        }
        map.rebuild_costmap();
        let shared = map.cost_layer().clone();

        let a = map.planning_view(extra);
        let b = map.planning_view(extra);
        prop_assert_eq!(a, b);
        prop_assert_eq!(map.cost_layer(), &shared);
    }
}
