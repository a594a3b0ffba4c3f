use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    grains::ClimateTendency,
    spatial::{BoundingBox, GridSpec},
};

fn default_num_runs() -> u32 {
    5
}

fn default_locations_per_run() -> CountRange {
    CountRange::new(2000, 3000)
}

fn default_grains_per_location() -> CountRange {
    CountRange::new(5, 20)
}

fn default_delta_max() -> f64 {
    0.0025
}

pub fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, 21).unwrap_or_default()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Inclusive integer range, written as `[min, max]` in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u32, u32)", into = "(u32, u32)")]
pub struct CountRange {
    pub min: u32,
    pub max: u32,
}

impl CountRange {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub const fn fixed(value: u32) -> Self {
        Self::new(value, value)
    }
}

impl From<(u32, u32)> for CountRange {
    fn from((min, max): (u32, u32)) -> Self {
        Self::new(min, max)
    }
}

impl From<CountRange> for (u32, u32) {
    fn from(range: CountRange) -> Self {
        (range.min, range.max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Static configuration for one dataset generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_num_runs")]
    pub num_runs: u32,
    #[serde(default = "default_locations_per_run")]
    pub locations_per_run: CountRange,
    #[serde(default = "default_grains_per_location")]
    pub grains_per_location: CountRange,
    /// Half-width of the sampled square around the beach center, in degrees.
    #[serde(default = "default_delta_max")]
    pub delta_max: f64,
    #[serde(default)]
    pub grid: GridSpec,
    #[serde(default)]
    pub tendency: ClimateTendency,
    #[serde(default = "default_start_date")]
    pub start_date: NaiveDate,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            num_runs: default_num_runs(),
            locations_per_run: default_locations_per_run(),
            grains_per_location: default_grains_per_location(),
            delta_max: default_delta_max(),
            grid: GridSpec::default(),
            tendency: ClimateTendency::default(),
            start_date: default_start_date(),
            seed: None,
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid bounding box on {axis} axis: min {min} must be below max {max}")]
    InvalidBoundingBox {
        axis: &'static str,
        min: f64,
        max: f64,
    },
    #[error("center ({lat}, {lon}) is outside valid coordinates")]
    CenterOutOfRange { lat: f64, lon: f64 },
    #[error("box [{min_lat}, {max_lat}] x [{min_lon}, {max_lon}] extends past valid coordinates")]
    BoxOutOfRange {
        min_lat: f64,
        max_lat: f64,
        min_lon: f64,
        max_lon: f64,
    },
    #[error("{name} range is empty: min {min} exceeds max {max}")]
    EmptyRange {
        name: &'static str,
        min: u32,
        max: u32,
    },
    #[error("{name} must be greater than zero")]
    NonPositive { name: &'static str },
    #[error("{name} must be a finite number")]
    NonFinite { name: &'static str },
}

impl GenerationConfig {
    /// Checks everything that can be checked without a beach center.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_runs == 0 {
            return Err(ConfigError::NonPositive { name: "num_runs" });
        }
        check_range("locations_per_run", self.locations_per_run)?;
        if self.locations_per_run.min == 0 {
            return Err(ConfigError::NonPositive {
                name: "locations_per_run",
            });
        }
        check_range("grains_per_location", self.grains_per_location)?;
        if !self.delta_max.is_finite() {
            return Err(ConfigError::NonFinite { name: "delta_max" });
        }
        if self.delta_max <= 0.0 {
            return Err(ConfigError::NonPositive { name: "delta_max" });
        }
        if self.grid.cols == 0 {
            return Err(ConfigError::NonPositive { name: "grid.cols" });
        }
        if self.grid.rows == 0 {
            return Err(ConfigError::NonPositive { name: "grid.rows" });
        }
        self.tendency.validate()
    }

    /// Validates the config and derives the sampling box around a center.
    pub fn bounding_box(&self, center_lat: f64, center_lon: f64) -> Result<BoundingBox, ConfigError> {
        self.validate()?;
        BoundingBox::around(center_lat, center_lon, self.delta_max)
    }
}

fn check_range(name: &'static str, range: CountRange) -> Result<(), ConfigError> {
    if range.min > range.max {
        return Err(ConfigError::EmptyRange {
            name,
            min: range.min,
            max: range.max,
        });
    }
    Ok(())
}

pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<GenerationConfig> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: GenerationConfig = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }
}
