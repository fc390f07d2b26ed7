//! # Map Configuration
//!
//! Settings for the region store, the renderer and the task pipeline, read from a
//! JSON file. Every field is optional; missing fields take their defaults.
//!
//! ```json
//! {
//!     "region_dir": "saves/world",
//!     "realistic_shading": true,
//!     "max_open_regions": 16
//! }
//! ```

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::map_state::{render::HeightShading, task_management::TaskManagerConfig};

/// Failure to load a `MapConfig`.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("could not read config '{path}': {source}")]
    Io {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// The file is not valid config JSON.
    #[error("could not parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Configuration of a `MapState`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Root directory of the region files.
    pub region_dir: PathBuf,
    /// Use the arctangent height-shading curve instead of contour lines.
    pub realistic_shading: bool,
    /// Pending-task count above which the pipeline logs a diagnostic.
    pub high_water_mark: usize,
    /// Drain attempts made when shutting the pipeline down.
    pub shutdown_attempts: u32,
    /// Milliseconds between unproductive drain attempts at shutdown.
    pub shutdown_delay_ms: u64,
    /// Region files kept open at once.
    pub max_open_regions: usize,
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            region_dir: PathBuf::from("regions"),
            realistic_shading: false,
            high_water_mark: 500,
            shutdown_attempts: 50,
            shutdown_delay_ms: 5,
            max_open_regions: 8,
        }
    }
}

impl MapConfig {
    /// Reads a config from the JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parses a config from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// The height-shading curve selected by `realistic_shading`.
    pub fn height_shading(&self) -> HeightShading {
        HeightShading::from_flag(self.realistic_shading)
    }
}

impl From<&MapConfig> for TaskManagerConfig {
    fn from(config: &MapConfig) -> Self {
        TaskManagerConfig {
            high_water_mark: config.high_water_mark,
            shutdown_attempts: config.shutdown_attempts,
            shutdown_delay: Duration::from_millis(config.shutdown_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = MapConfig::from_json(r#"{ "realistic_shading": true }"#).unwrap();
        assert!(config.realistic_shading);
        assert_eq!(config.high_water_mark, 500);
        assert_eq!(config.region_dir, PathBuf::from("regions"));
        assert_eq!(config.height_shading(), HeightShading::Realistic);
    }

    #[test]
    fn pipeline_settings_carry_over() {
        let config = MapConfig {
            shutdown_delay_ms: 20,
            shutdown_attempts: 3,
            ..MapConfig::default()
        };
        let pipeline = TaskManagerConfig::from(&config);
        assert_eq!(pipeline.shutdown_delay, Duration::from_millis(20));
        assert_eq!(pipeline.shutdown_attempts, 3);
    }

    #[test]
    fn bad_json_is_a_parse_error() {
        assert!(matches!(MapConfig::from_json("{ nope"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = MapConfig::load(dir.path().join("absent.json"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.json");
        fs::write(&path, r#"{ "max_open_regions": 2, "region_dir": "out" }"#).unwrap();
        let config = MapConfig::load(&path).unwrap();
        assert_eq!(config.max_open_regions, 2);
        assert_eq!(config.region_dir, PathBuf::from("out"));
    }
}
