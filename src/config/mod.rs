//! Runtime configuration.
//!
//! Values come from the optional settings file first, then environment
//! variables (after `.env` is loaded by the binary) override them.

mod booking;
pub(crate) mod helpers;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub use booking::{BookingConfig, parse_utc_offset};

use crate::config::helpers::{parse_env, parse_string_env};
use crate::error::ConfigError;
use crate::settings::Settings;

/// Which store implementation to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    LibSql,
    Memory,
}

impl DatabaseBackend {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "libsql" | "sqlite" | "turso" => Ok(Self::LibSql),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => Err(ConfigError::InvalidValue {
                key: "DATABASE_BACKEND".to_string(),
                message: format!("unsupported backend '{other}'"),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LibSql => "libsql",
            Self::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub libsql_path: PathBuf,
}

impl DatabaseConfig {
    fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let backend_raw =
            parse_string_env("DATABASE_BACKEND", settings.database.backend.clone())?;
        let libsql_path =
            parse_string_env("LIBSQL_PATH", settings.database.libsql_path.clone())?;
        if libsql_path.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "LIBSQL_PATH".to_string(),
                message: "database path must not be empty".to_string(),
            });
        }
        Ok(Self {
            backend: DatabaseBackend::from_str(&backend_raw)?,
            libsql_path: PathBuf::from(libsql_path),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            host: parse_string_env("HTTP_HOST", settings.server.host.clone())?,
            port: parse_env("HTTP_PORT", settings.server.port)?,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::InvalidValue {
                key: "HTTP_HOST".to_string(),
                message: format!("'{}:{}' is not a socket address: {e}", self.host, self.port),
            })
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub booking: BookingConfig,
}

impl Config {
    /// Load the settings file (if any) and apply env overrides.
    pub fn load(settings_path: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = Settings::load(settings_path)?;
        Self::resolve(&settings)
    }

    pub fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            database: DatabaseConfig::resolve(settings)?,
            server: ServerConfig::resolve(settings)?,
            booking: BookingConfig::resolve(settings)?,
        })
    }
}
