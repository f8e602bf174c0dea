//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use nebula_voxel::{EvictionPolicy, VolumeSettings};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Name of the config file inside the config directory.
const CONFIG_FILE: &str = "config.ron";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Paged volume settings.
    pub volume: VolumeConfig,
    /// Procedural pager settings.
    pub pager: PagerConfig,
    /// Concurrent sampling workload.
    pub workload: WorkloadConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Paged volume configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VolumeConfig {
    /// Memory the volume aims to keep its chunk data under, in MiB.
    pub memory_budget_mb: usize,
    /// Chunk side length in voxels (power of two, at most 256).
    pub chunk_side_length: u16,
    /// How many chunks to evict when the chunk table is full.
    pub eviction: EvictionPolicy,
}

/// Pager configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PagerConfig {
    /// Noise seed for terrain generation.
    pub seed: u32,
    /// Average terrain surface height in voxels.
    pub terrain_height: i32,
    /// Keep modified chunks in memory after eviction and reload them later.
    pub persist_modified: bool,
}

/// Workload configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Worker threads (0 = one per CPU).
    pub threads: usize,
    /// Side length of each sampled region in voxels.
    pub region_size: i32,
    /// Number of regions to sample.
    pub regions: u32,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Directory for JSON log files. Relative paths resolve against the config directory.
    pub log_dir: PathBuf,
    /// Write JSON logs to `log_dir` in addition to the console.
    pub file_logging: bool,
}

// --- Default implementations ---

impl Default for VolumeConfig {
    fn default() -> Self {
        let settings = VolumeSettings::default();
        Self {
            memory_budget_mb: settings.target_memory_bytes / (1024 * 1024),
            chunk_side_length: settings.chunk_side_length,
            eviction: settings.eviction,
        }
    }
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self {
            seed: 1337,
            terrain_height: 48,
            persist_modified: true,
        }
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            region_size: 32,
            regions: 64,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
            file_logging: false,
        }
    }
}

impl VolumeConfig {
    /// Converts to the settings a `PagedVolume` is built from.
    pub fn to_settings(&self) -> VolumeSettings {
        VolumeSettings {
            target_memory_bytes: self.memory_budget_mb.saturating_mul(1024 * 1024),
            chunk_side_length: self.chunk_side_length,
            eviction: self.eviction,
        }
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Platform config directory for these tools (`<config_dir>/nebula-voxel`).
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("nebula-voxel"))
    }

    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join(CONFIG_FILE);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
