// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Bincode snapshot files for the occupancy and cost layers.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::grid::{GridError, GridMap, MapSnapshot};

#[derive(Debug, Error)]
pub enum MapStoreError {
    #[error("map snapshot I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("map snapshot encoding: {0}")]
    Codec(#[from] bincode::Error),

    #[error("invalid map snapshot: {0}")]
    Grid(#[from] GridError),
}

#[derive(Debug, Clone)]
pub struct MapStore {
    path: PathBuf,
}

impl MapStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Writes to a sibling temp file and renames it into place, so a reader
    /// never sees a half-written snapshot.
    pub fn save(&self, snapshot: &MapSnapshot) -> Result<(), MapStoreError> {
        let bytes = bincode::serialize(snapshot)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| self.io(source))?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &bytes).map_err(|source| self.io(source))?;
        std::fs::rename(&tmp, &self.path).map_err(|source| self.io(source))?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "Map snapshot written");
        Ok(())
    }

    pub fn load(&self) -> Result<MapSnapshot, MapStoreError> {
        let bytes = std::fs::read(&self.path).map_err(|source| self.io(source))?;
        Ok(bincode::deserialize(&bytes)?)
    }

    /// Replaces both layers of `map` with the stored snapshot.
    pub fn load_into(&self, map: &mut GridMap) -> Result<(), MapStoreError> {
        let snapshot = self.load()?;
        map.restore(snapshot)?;
        info!(
            path = %self.path.display(),
            size = map.geometry().size(),
            occupied = map.occupancy().occupied_count(),
            "Map snapshot loaded"
        );
        Ok(())
    }

    fn io(&self, source: std::io::Error) -> MapStoreError {
        MapStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geometry::GridGeometry;
    use crate::domain::grid::MapSettings;

    #[test]
    fn test_save_and_load_replaces_layers() {
        let dir = tempfile::tempdir().unwrap();
        let store = MapStore::new(dir.path().join("maps").join("grid.bin"));

        let mut saved = GridMap::new(GridGeometry::new(31, 0.1), MapSettings::default());
        saved.stamp(0.5, -0.3);
        saved.rebuild_costmap();
        store.save(&saved.snapshot()).unwrap();
        assert!(store.exists());

        let mut loaded = GridMap::new(GridGeometry::new(11, 0.2), MapSettings::default());
        store.load_into(&mut loaded).unwrap();
        assert_eq!(loaded.geometry().size(), 31);
        assert_eq!(loaded.geometry().resolution(), 0.1);
        assert_eq!(loaded.occupancy(), saved.occupancy());
        assert_eq!(loaded.cost_layer(), saved.cost_layer());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = MapStore::new(dir.path().join("absent.bin"));
        assert!(matches!(store.load(), Err(MapStoreError::Io { .. })));
    }

    #[test]
    fn test_corrupt_snapshot_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.bin");
        let snapshot = MapSnapshot {
            resolution: 0.2,
            size: 5,
            occupancy: vec![0; 3],
            costs: vec![0.0; 25],
        };
        std::fs::write(&path, bincode::serialize(&snapshot).unwrap()).unwrap();

        let mut map = GridMap::new(GridGeometry::new(5, 0.2), MapSettings::default());
        let err = MapStore::new(&path).load_into(&mut map).unwrap_err();
        assert!(matches!(err, MapStoreError::Grid(GridError::LayerMismatch { .. })));
    }
}
