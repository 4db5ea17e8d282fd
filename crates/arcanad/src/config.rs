//! Configuration management for arcanad.
//!
//! Loads settings from /etc/arcana/config.toml or uses defaults.

use crate::oracle::OracleConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/arcana/config.toml";

/// Retention sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Threads inactive longer than this are deleted with their readings
    #[serde(default = "default_inactive_days")]
    pub inactive_days: i64,

    /// How often the background sweep runs
    #[serde(default = "default_sweep_interval_hours")]
    pub sweep_interval_hours: u64,
}

fn default_inactive_days() -> i64 {
    30
}

fn default_sweep_interval_hours() -> u64 {
    24
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            inactive_days: default_inactive_days(),
            sweep_interval_hours: default_sweep_interval_hours(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Directory holding the 78 card image files
    #[serde(default = "default_card_image_dir")]
    pub card_image_dir: PathBuf,

    #[serde(default)]
    pub oracle: OracleConfig,

    #[serde(default)]
    pub retention: RetentionConfig,
}

fn default_bind_addr() -> String {
    // Localhost only; fronted by a reverse proxy in deployment
    "127.0.0.1:7471".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/var/lib/arcana/readings.db")
}

fn default_card_image_dir() -> PathBuf {
    PathBuf::from("/var/lib/arcana/cards")
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            db_path: default_db_path(),
            card_image_dir: default_card_image_dir(),
            oracle: OracleConfig::default(),
            retention: RetentionConfig::default(),
        }
    }
}

impl DaemonConfig {
    pub fn load() -> Self {
        Self::load_from(Path::new(CONFIG_PATH))
    }

    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Invalid config at {}: {e}; using defaults", path.display());
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }
}
