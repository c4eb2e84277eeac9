// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Fleet Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) describing:
// - Map geometry, inflation, freeze mode and persistence
// - Planner, classifier, executor and parking tuning
// - Supervisor cadence
// - Fleet roster (robots, sensors, home poses) and named locations
// - Optional in-process simulation world
// - Logging settings

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::classifier::ClassifierConfig;
use crate::domain::costmap::Neighborhood;
use crate::domain::geometry::{GridGeometry, Point2};
use crate::domain::grid::MapSettings;
use crate::domain::parking::ParkingConfig;
use crate::domain::planner::PlannerConfig;
use crate::domain::ports::SensorId;
use crate::domain::robot::{Orientation, RobotId};

pub const API_VERSION: &str = "fleet.robotics/v1";
pub const KIND: &str = "FleetConfig";

/// Top-level Kubernetes-style fleet configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfigManifest {
    /// API version (must be "fleet.robotics/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "FleetConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: FleetConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetConfigSpec {
    #[serde(default)]
    pub map: MapConfig,

    #[serde(default)]
    pub planner: PlannerConfig,

    #[serde(default)]
    pub classifier: ClassifierSection,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub parking: ParkingSection,

    #[serde(default)]
    pub supervisor: SupervisorConfig,

    #[serde(default)]
    pub fleet: FleetRoster,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulation: Option<SimulationConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Meters per cell
    pub resolution: f64,

    /// Initial cells per side (forced odd)
    pub size: usize,

    /// Inflation radius applied to every hit cell, meters
    pub inflation_radius: f64,

    pub neighborhood: Neighborhood,

    /// Use the saved map only: no live updates, no growth
    pub freeze: bool,

    /// Margin kept around planning endpoints when growing the grid
    pub growth_margin: f64,

    /// Bincode snapshot loaded at start and written on autosave
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<String>,

    /// Save the snapshot every N cost-layer rebuilds (0 disables)
    pub autosave_every: u64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            resolution: 0.2,
            size: 225,
            inflation_radius: 0.10,
            neighborhood: Neighborhood::Square,
            freeze: false,
            growth_margin: 1.0,
            snapshot_path: None,
            autosave_every: 25,
        }
    }
}

impl MapConfig {
    pub fn geometry(&self) -> GridGeometry {
        GridGeometry::new(self.size, self.resolution)
    }

    pub fn settings(&self) -> MapSettings {
        MapSettings {
            inflation_radius: self.inflation_radius,
            neighborhood: self.neighborhood,
            freeze: self.freeze,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierSection {
    #[serde(flatten)]
    pub thresholds: ClassifierConfig,

    /// `(col,row)` list of static clutter ignored by the classifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignored_cells_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Per-axis waypoint tolerance, meters
    pub goal_tolerance: f64,

    /// Both axes above this move diagonally
    pub align_tolerance: f64,

    pub max_replans: u32,

    pub tick_interval_ms: u64,

    /// Commanded speed per moving axis, m/s
    pub speed: f64,

    /// Poll period while paused at a static obstacle
    pub obstacle_poll_ms: u64,

    /// Bound on detour ticks before giving up and replanning
    pub detour_max_ticks: u32,

    /// Sensors read every tick
    pub sensors: Vec<String>,

    /// Attitude held on every tick
    pub reference_orientation: Orientation,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            goal_tolerance: 0.10,
            align_tolerance: 0.10,
            max_replans: 8,
            tick_interval_ms: 10,
            speed: 0.3,
            obstacle_poll_ms: 200,
            detour_max_ticks: 3_000,
            sensors: vec!["S300".to_string(), "S3001".to_string()],
            reference_orientation: Orientation::default(),
        }
    }
}

impl ExecutorConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn obstacle_poll(&self) -> Duration {
        Duration::from_millis(self.obstacle_poll_ms)
    }

    pub fn sensor_ids(&self) -> Vec<SensorId> {
        self.sensors.iter().map(SensorId::new).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParkingSection {
    #[serde(flatten)]
    pub rules: ParkingConfig,

    #[serde(default = "default_parking_tick")]
    pub tick_interval_ms: u64,

    /// `(col,row)` list of cells a parked robot may stop on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_free_path: Option<String>,
}

impl Default for ParkingSection {
    fn default() -> Self {
        Self {
            rules: ParkingConfig::default(),
            tick_interval_ms: default_parking_tick(),
            known_free_path: None,
        }
    }
}

impl ParkingSection {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Reap cadence
    pub tick_interval_ms: u64,

    /// Capacity of the command and reply channels
    pub command_buffer: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            command_buffer: 64,
        }
    }
}

impl SupervisorConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotConfig {
    pub id: String,

    /// Start pose in the simulator; ignored by real drivers
    #[serde(default)]
    pub start: [f64; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetRoster {
    #[serde(default)]
    pub robots: Vec<RobotConfig>,

    /// Named destinations, lowercase labels
    #[serde(default)]
    pub locations: BTreeMap<String, [f64; 2]>,
}

impl Default for FleetRoster {
    fn default() -> Self {
        let robots = [("Rob0", [0.0, 0.0]), ("Rob1", [2.0, 0.0]), ("Rob2", [-2.0, 0.0])]
            .into_iter()
            .map(|(id, start)| RobotConfig {
                id: id.to_string(),
                start,
            })
            .collect();
        let locations = [
            ("point a", [1.5, 3.0]),
            ("point b", [-2.0, 1.0]),
            ("point c", [-6.24974, 6.36916]),
        ]
        .into_iter()
        .map(|(label, at)| (label.to_string(), at))
        .collect();
        Self { robots, locations }
    }
}

impl FleetRoster {
    pub fn robot_ids(&self) -> Vec<RobotId> {
        self.robots.iter().map(|r| RobotId::normalized(&r.id)).collect()
    }

    /// Case-insensitive label lookup.
    pub fn location(&self, label: &str) -> Option<Point2> {
        let key = label.trim().to_lowercase();
        self.locations.get(&key).map(|p| Point2::from(*p))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Integration step per pose read, seconds
    pub dt: f64,

    /// Maximum sensor range, meters
    pub sensor_range: f64,

    /// Radius of the sampled robot body seen by other robots' sensors
    pub robot_radius: f64,

    /// Static obstacle points
    pub obstacles: Vec<[f64; 2]>,

    /// Axis-aligned walls sampled at the map resolution: [x0, y0, x1, y1]
    pub walls: Vec<[f64; 4]>,

    /// Robots whose handles fail to initialise
    pub unreachable: Vec<String>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt: 0.05,
            sensor_range: 5.0,
            robot_radius: 0.3,
            obstacles: vec![],
            walls: vec![],
            unreachable: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// "compact" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_parking_tick() -> u64 {
    50
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for FleetConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "fleet".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: FleetConfigSpec::default(),
        }
    }
}

impl FleetConfigManifest {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. FLEET_CONFIG_PATH environment variable
    /// 2. ./fleet-config.yaml (working directory)
    /// 3. ~/.fleet/config.yaml (user home)
    /// 4. /etc/fleet/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("FLEET_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./fleet-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".fleet").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/fleet/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path fails if missing or invalid
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("FLEET_FREEZE_MAP") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => {
                    tracing::info!("Environment override: FLEET_FREEZE_MAP=true");
                    self.spec.map.freeze = true;
                }
                "false" | "0" | "no" | "off" => {
                    tracing::info!("Environment override: FLEET_FREEZE_MAP=false");
                    self.spec.map.freeze = false;
                }
                _ => {
                    tracing::warn!(
                        "Invalid value for FLEET_FREEZE_MAP: '{}'. Expected true/false. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Ok(path) = std::env::var("FLEET_MAP_SNAPSHOT") {
            if !path.trim().is_empty() {
                tracing::info!("Environment override: FLEET_MAP_SNAPSHOT={}", path);
                self.spec.map.snapshot_path = Some(path);
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let spec = &self.spec;
        if !(spec.map.resolution > 0.0) {
            anyhow::bail!("spec.map.resolution must be positive");
        }
        if spec.map.size == 0 {
            anyhow::bail!("spec.map.size must be positive");
        }
        if !(spec.planner.block_threshold > 0.0 && spec.planner.block_threshold <= 1.0) {
            anyhow::bail!("spec.planner.block_threshold must be in (0, 1]");
        }
        if spec.planner.proximity_gain < 0.0 {
            anyhow::bail!("spec.planner.proximity_gain cannot be negative");
        }
        if !(spec.classifier.thresholds.range_threshold > 0.0) {
            anyhow::bail!("spec.classifier.range_threshold must be positive");
        }
        if !(spec.classifier.thresholds.dominance_ratio > 0.0) {
            anyhow::bail!("spec.classifier.dominance_ratio must be positive");
        }
        if !(spec.executor.goal_tolerance > 0.0) {
            anyhow::bail!("spec.executor.goal_tolerance must be positive");
        }
        if !(spec.executor.speed > 0.0) {
            anyhow::bail!("spec.executor.speed must be positive");
        }
        if spec.executor.max_replans == 0 {
            anyhow::bail!("spec.executor.max_replans must be at least 1");
        }
        if !(spec.parking.rules.safe_margin > 0.0) {
            anyhow::bail!("spec.parking.safe_margin must be positive");
        }

        if spec.fleet.robots.is_empty() {
            anyhow::bail!("spec.fleet.robots must list at least one robot");
        }
        let mut seen = HashSet::new();
        for robot in &spec.fleet.robots {
            if robot.id.trim().is_empty() {
                anyhow::bail!("Robot id cannot be empty");
            }
            if !seen.insert(RobotId::normalized(&robot.id)) {
                anyhow::bail!("Duplicate robot id: {}", robot.id);
            }
        }
        for label in spec.fleet.locations.keys() {
            if label.trim().is_empty() {
                anyhow::bail!("Location label cannot be empty");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let manifest = FleetConfigManifest::default();
        assert_eq!(manifest.api_version, API_VERSION);
        assert_eq!(manifest.kind, KIND);
        assert_eq!(manifest.spec.map.size, 225);
        assert_eq!(manifest.spec.executor.max_replans, 8);
        assert_eq!(manifest.spec.fleet.robots.len(), 3);
        manifest.validate().unwrap();
    }

    #[test]
    fn test_yaml_roundtrip() {
        let yaml = r#"
apiVersion: fleet.robotics/v1
kind: FleetConfig
metadata:
  name: warehouse
spec:
  map:
    resolution: 0.1
    freeze: true
  planner:
    proximity_rings: 2
  classifier:
    range_threshold: 0.6
    ignored_cells_path: /tmp/occupied_grids.txt
  parking:
    safe_margin: 1.5
    known_free_path: /tmp/free_grids.txt
  fleet:
    robots:
      - id: Robot0
        start: [0.0, 0.0]
      - id: Rob1
        start: [5.0, 5.0]
    locations:
      dock: [1.0, -1.0]
"#;
        let manifest = FleetConfigManifest::from_yaml_str(yaml).unwrap();
        manifest.validate().unwrap();
        assert_eq!(manifest.spec.map.resolution, 0.1);
        assert_eq!(manifest.spec.map.size, 225);
        assert!(manifest.spec.map.freeze);
        assert_eq!(manifest.spec.planner.proximity_rings, 2);
        assert_eq!(manifest.spec.planner.proximity_gain, 0.5);
        assert_eq!(manifest.spec.classifier.thresholds.range_threshold, 0.6);
        assert_eq!(manifest.spec.classifier.thresholds.robot_proximity, 1.0);
        assert_eq!(manifest.spec.parking.rules.safe_margin, 1.5);
        assert_eq!(manifest.spec.parking.rules.reach_tolerance, 0.12);
        assert_eq!(
            manifest.spec.fleet.robot_ids(),
            vec![RobotId::new("Rob0"), RobotId::new("Rob1")]
        );
        assert_eq!(manifest.spec.fleet.location("Dock"), Some(Point2::new(1.0, -1.0)));

        let again = FleetConfigManifest::from_yaml_str(&manifest.to_yaml_string().unwrap()).unwrap();
        assert_eq!(again.spec.map.resolution, 0.1);
        assert_eq!(
            again.spec.parking.known_free_path.as_deref(),
            Some("/tmp/free_grids.txt")
        );
    }

    #[test]
    fn test_validation() {
        let mut manifest = FleetConfigManifest::default();
        manifest.api_version = "v0".to_string();
        assert!(manifest.validate().is_err());

        let mut manifest = FleetConfigManifest::default();
        manifest.spec.map.resolution = 0.0;
        assert!(manifest.validate().is_err());

        let mut manifest = FleetConfigManifest::default();
        manifest.spec.fleet.robots.push(RobotConfig {
            id: "Robot0".to_string(),
            start: [9.0, 9.0],
        });
        assert!(manifest.validate().is_err());

        let mut manifest = FleetConfigManifest::default();
        manifest.spec.planner.block_threshold = 1.5;
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_default_locations() {
        let roster = FleetRoster::default();
        assert_eq!(roster.location("Point A"), Some(Point2::new(1.5, 3.0)));
        assert_eq!(roster.location("nowhere"), None);
    }
}
