//! TOML deployment configuration.
//!
//! A deployment pins the physical floor dimensions, the marker dictionary
//! and, when the standard six-anchor rectangle does not match the site,
//! explicit marker positions. CLIs load this once at startup; the library
//! types it produces are plain [`Dictionary`] and [`CalibrationMap`]
//! values.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dict::{Dictionary, DictionaryError};
use crate::mapping::{CalibrationMap, WorldPoint};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Dictionary(#[from] DictionaryError),
    #[error("world rectangle must be positive, got {width} x {height}")]
    WorldSize { width: f64, height: f64 },
    #[error("marker {id} has a non-finite coordinate")]
    Coordinate { id: u32 },
    #[error("marker {id} listed twice")]
    DuplicateMarker { id: u32 },
}

fn default_dictionary() -> String {
    "4x4_50".to_string()
}

/// Deployment configuration for a fixed camera watching a floor region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Physical width of the calibrated floor rectangle, world units.
    pub world_width: f64,
    /// Physical height of the calibrated floor rectangle, world units.
    pub world_height: f64,
    #[serde(default = "default_dictionary")]
    pub dictionary: String,
    /// Marker positions overriding or extending the standard rectangle
    /// layout.
    #[serde(default)]
    pub markers: Vec<MarkerEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerEntry {
    pub id: u32,
    pub x: f64,
    pub y: f64,
}

impl CalibrationConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a TOML config from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.world_width > 0.0 && self.world_height > 0.0) {
            return Err(ConfigError::WorldSize {
                width: self.world_width,
                height: self.world_height,
            });
        }
        let mut seen = BTreeSet::new();
        for m in &self.markers {
            if !(m.x.is_finite() && m.y.is_finite()) {
                return Err(ConfigError::Coordinate { id: m.id });
            }
            if !seen.insert(m.id) {
                return Err(ConfigError::DuplicateMarker { id: m.id });
            }
        }
        Ok(())
    }

    /// Resolve the configured dictionary.
    pub fn dictionary(&self) -> Result<Dictionary, ConfigError> {
        Ok(Dictionary::builtin(&self.dictionary)?)
    }

    /// Build the calibration table: the standard rectangle for the
    /// configured dimensions, with any explicit `markers` entries applied
    /// on top.
    pub fn calibration_map(&self) -> CalibrationMap {
        let mut map = CalibrationMap::rectangle(self.world_width, self.world_height);
        for m in &self.markers {
            map.insert(m.id, WorldPoint::new(m.x, m.y));
        }
        map
    }
}
