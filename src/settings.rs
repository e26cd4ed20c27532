//! On-disk settings file.
//!
//! Every field has a default, so an absent or partial TOML file is valid.
//! Environment variables override these values in `Config::resolve`.

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub server: ServerSettings,
    pub booking: BookingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub backend: String,
    pub libsql_path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            backend: "libsql".to_string(),
            libsql_path: "./data/counsel_desk.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BookingSettings {
    pub default_utc_offset: String,
    pub slot_start_hour: u32,
    pub slot_end_hour: u32,
    pub upcoming_days: i64,
    pub upcoming_limit: usize,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            default_utc_offset: "+00:00".to_string(),
            slot_start_hour: 9,
            slot_end_hour: 16,
            upcoming_days: 30,
            upcoming_limit: 10,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file. `None` yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Settings {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&raw).map_err(|reason| ConfigError::Settings {
            path: path.display().to_string(),
            reason,
        })
    }

    pub fn from_toml(raw: &str) -> Result<Self, String> {
        toml::from_str(raw).map_err(|e| format!("invalid settings TOML: {e}"))
    }
}
