//! Scene configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config:
//!
//! ```json
//! { "growth_block": 256, "keyframe_lookup": "uniform_estimate" }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ecs::DEFAULT_GROWTH_BLOCK;
use crate::error::ConfigError;

/// How the sampler finds the keyframe pair around the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyframeLookup {
    /// Binary search over the keyframe times. Correct for any spacing.
    #[default]
    BinarySearch,
    /// Closed-form index assuming evenly spaced keyframes. Cheaper, but picks
    /// the wrong pair when spacing is uneven.
    UniformEstimate,
}

/// Tunables for building and running a [`Scene`](crate::scene::Scene).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Slots added to every column when the store runs out.
    pub growth_block: u32,
    /// Slots reserved before import starts.
    pub initial_capacity: u32,
    pub keyframe_lookup: KeyframeLookup,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            growth_block: DEFAULT_GROWTH_BLOCK,
            initial_capacity: 0,
            keyframe_lookup: KeyframeLookup::default(),
        }
    }
}

impl SceneConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.growth_block == 0 {
            return Err(ConfigError::ZeroGrowthBlock);
        }
        Ok(())
    }
}
