//! Error types for the store, configuration, HTTP startup, and service layers.

use thiserror::Error;

/// Failures raised by a `Database` backend.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A unique index rejected the write. Carries the index name.
    #[error("Constraint violated: {0}")]
    Constraint(String),
}

#[cfg(feature = "libsql")]
impl From<libsql::Error> for DatabaseError {
    fn from(err: libsql::Error) -> Self {
        let message = err.to_string();
        if let Some(index) = crate::db::libsql::unique_violation_index(&message) {
            return Self::Constraint(index);
        }
        Self::Query(message)
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to read settings file {path}: {reason}")]
    Settings { path: String, reason: String },
}

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Server {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },
}

/// Outcome of a marketplace operation that did not succeed.
///
/// The display string is the user-facing message; no structured code crosses
/// the HTTP boundary beyond the status mapping in `web::server`.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl ServiceError {
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation",
            Self::InvalidState(_) => "invalid_state",
            Self::Conflict(_) => "conflict",
            Self::Database(_) => "database",
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
