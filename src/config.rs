//! Runtime configuration
//!
//! Tunables for the simulation loop, stored as RON. Every field has a
//! default, so a config file only needs the values it changes:
//!
//! ```text
//! (
//!     max_dt: 0.05,
//!     script_max_operations: 200000,
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Upper bound on a frame's dt in seconds
    pub max_dt: f32,
    /// Assets decoded per frame
    pub asset_decode_budget: usize,
    /// Script operations allowed per handler call
    pub script_max_operations: u64,
    pub script_max_call_depth: usize,
    pub script_max_string_size: usize,
    pub script_max_array_size: usize,
    /// Opacity of the grid drawn for tilemaps whose tileset is not ready
    pub placeholder_grid_alpha: f32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_dt: 1.0 / 30.0,
            asset_decode_budget: 4,
            script_max_operations: 100_000,
            script_max_call_depth: 32,
            script_max_string_size: 64 * 1024,
            script_max_array_size: 10_000,
            placeholder_grid_alpha: 0.15,
        }
    }
}

impl RuntimeConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_dt > 0.0) {
            return Err(ConfigError::Invalid(format!("max_dt must be positive, got {}", self.max_dt)));
        }
        if self.asset_decode_budget == 0 {
            return Err(ConfigError::Invalid("asset_decode_budget must be at least 1".into()));
        }
        Ok(())
    }
}
