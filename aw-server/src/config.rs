use std::fs;
use std::path::{Path, PathBuf};

use aw_sim::intercept::{DEFAULT_CLEARANCE_PADDING, DEFAULT_MAX_STEPS, DEFAULT_TELEPORT_BOUNCE};
use aw_sim::penetration::{DEFAULT_MAX_ROUNDS, DEFAULT_PUSH_EPSILON};
use aw_sim::pick::DEFAULT_REACH;
use aw_sim::{BodySize, InterceptConfig, PenetrationConfig};
use aw_utils::airwall_data_root;
use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_FILE: &str = "server.toml";
pub const STORE_FILE: &str = "barriers.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub tick_rate_hz: f64,
    /// Barrier store location. Defaults to `barriers.json` under the data root.
    pub data_file: Option<PathBuf>,
    pub save_interval_secs: f64,
    pub resync_interval_secs: f64,
    /// Frames at least this long are zlib-compressed; negative disables.
    pub compression_threshold: i32,
    /// Clients that stop reading for this long are disconnected.
    pub write_timeout_secs: f64,
    /// Height given to barriers saved before grids had a Y axis.
    pub legacy_wall_height: i32,
    pub collision: CollisionSettings,
    pub editing: EditingSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:25590".to_string(),
            tick_rate_hz: 20.0,
            data_file: None,
            save_interval_secs: 10.0,
            resync_interval_secs: 30.0,
            compression_threshold: 256,
            write_timeout_secs: 5.0,
            legacy_wall_height: 320,
            collision: CollisionSettings::default(),
            editing: EditingSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionSettings {
    pub clearance_padding: f64,
    pub teleport_bounce: f64,
    pub max_intercept_steps: u32,
    pub body_half_width: f64,
    pub body_height: f64,
    pub penetration_epsilon: f64,
    pub max_correction_rounds: u32,
    /// Cast side rays at the body half-width as well as the center ray.
    pub thick_rays: bool,
}

impl Default for CollisionSettings {
    fn default() -> Self {
        let body = BodySize::default();
        Self {
            clearance_padding: DEFAULT_CLEARANCE_PADDING,
            teleport_bounce: DEFAULT_TELEPORT_BOUNCE,
            max_intercept_steps: DEFAULT_MAX_STEPS,
            body_half_width: body.half_width,
            body_height: body.height,
            penetration_epsilon: DEFAULT_PUSH_EPSILON,
            max_correction_rounds: DEFAULT_MAX_ROUNDS,
            thick_rays: false,
        }
    }
}

impl CollisionSettings {
    pub fn body(&self) -> BodySize {
        BodySize {
            half_width: self.body_half_width,
            height: self.body_height,
        }
    }

    pub fn intercept(&self) -> InterceptConfig {
        InterceptConfig {
            clearance_padding: self.clearance_padding,
            teleport_bounce: self.teleport_bounce,
            max_steps: self.max_intercept_steps,
            body_height: self.body_height,
        }
    }

    pub fn penetration(&self) -> PenetrationConfig {
        PenetrationConfig {
            push_epsilon: self.penetration_epsilon,
            max_rounds: self.max_correction_rounds,
            body: self.body(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditingSettings {
    pub reach: f64,
    /// Solid ground below this Y occludes the editing ray. Unset means no
    /// terrain at all.
    pub ground_level: Option<i32>,
}

impl Default for EditingSettings {
    fn default() -> Self {
        Self {
            reach: DEFAULT_REACH,
            ground_level: None,
        }
    }
}

impl ServerConfig {
    pub fn from_toml(path: &Path, raw: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(path, &raw)
    }

    /// Loads `path` when it exists, otherwise returns the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be a positive number, got {value}"),
                })
            }
        }

        positive("tick_rate_hz", self.tick_rate_hz)?;
        positive("save_interval_secs", self.save_interval_secs)?;
        positive("resync_interval_secs", self.resync_interval_secs)?;
        positive("write_timeout_secs", self.write_timeout_secs)?;
        positive("collision.body_half_width", self.collision.body_half_width)?;
        positive("collision.body_height", self.collision.body_height)?;
        positive("editing.reach", self.editing.reach)?;
        if !(1..=aw_sim::grid::MAX_HEIGHT).contains(&self.legacy_wall_height) {
            return Err(ConfigError::Invalid {
                field: "legacy_wall_height",
                reason: format!(
                    "must be within 1..={}, got {}",
                    aw_sim::grid::MAX_HEIGHT,
                    self.legacy_wall_height
                ),
            });
        }
        Ok(())
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_file
            .clone()
            .unwrap_or_else(|| airwall_data_root().join(STORE_FILE))
    }
}
