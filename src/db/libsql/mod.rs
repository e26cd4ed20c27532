//! libSQL backend.
//!
//! One `libsql::Database` handle is opened at startup; each store call takes a
//! fresh connection from it. Use a file path (not `:memory:`) when several
//! connections must share state, as the tests do.

mod directory;
mod practice;

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use libsql::{Connection, Value};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::db::{
    ATTORNEY_BAR_ID_INDEX, ATTORNEY_EMAIL_INDEX, CLIENT_EMAIL_INDEX, CONSULTATION_SLOT_INDEX,
    Database, MATTER_PAIR_INDEX,
};
use crate::error::DatabaseError;

pub struct LibSqlBackend {
    db: libsql::Database,
}

impl LibSqlBackend {
    /// Open (or create) a local database file.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!(
                    "failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(e.to_string()))?;
        tracing::debug!(path = %path.display(), "opened libSQL database");
        Ok(Self { db })
    }

    pub async fn connect(&self) -> Result<Connection, DatabaseError> {
        self.db
            .connect()
            .map_err(|e| DatabaseError::Pool(e.to_string()))
    }
}

#[async_trait::async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;
        conn.execute_batch(crate::db::libsql_migrations::SCHEMA)
            .await
            .map_err(|e| DatabaseError::Query(format!("migration failed: {e}")))?;
        tracing::info!("libSQL schema is up to date");
        Ok(())
    }
}

/// Map SQLite's "UNIQUE constraint failed: table.col, ..." to our index name.
pub(crate) fn unique_violation_index(message: &str) -> Option<String> {
    let (_, columns) = message.split_once("UNIQUE constraint failed:")?;
    let columns = columns.trim();
    let index = if columns.starts_with("attorneys.email") {
        ATTORNEY_EMAIL_INDEX
    } else if columns.starts_with("attorneys.bar_association_id") {
        ATTORNEY_BAR_ID_INDEX
    } else if columns.starts_with("clients.email") {
        CLIENT_EMAIL_INDEX
    } else if columns.starts_with("matters.attorney_id") {
        MATTER_PAIR_INDEX
    } else if columns.starts_with("consultations.attorney_id") {
        CONSULTATION_SLOT_INDEX
    } else {
        return Some(columns.to_string());
    };
    Some(index.to_string())
}

pub(crate) fn fmt_ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| DatabaseError::Serialization(format!("invalid timestamp '{raw}': {e}")))
}

pub(crate) fn parse_dt_opt(raw: Option<String>) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    raw.map(|value| parse_timestamp(&value)).transpose()
}

pub(crate) fn parse_uuid(raw: &str, field: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw)
        .map_err(|e| DatabaseError::Serialization(format!("invalid {} uuid: {}", field, e)))
}

pub(crate) fn parse_decimal(raw: &str, field: &str) -> Result<Decimal, DatabaseError> {
    Decimal::from_str(raw.trim())
        .map_err(|e| DatabaseError::Serialization(format!("invalid {} decimal: {}", field, e)))
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

pub(crate) fn from_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, DatabaseError> {
    let raw = if raw.trim().is_empty() { "[]" } else { raw };
    serde_json::from_str(raw).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

pub(crate) fn get_text(row: &libsql::Row, idx: i32) -> String {
    row.get::<String>(idx).unwrap_or_default()
}

pub(crate) fn get_opt_text(row: &libsql::Row, idx: i32) -> Option<String> {
    match row.get_value(idx) {
        Ok(Value::Text(text)) => Some(text),
        _ => None,
    }
}

pub(crate) fn get_i64(row: &libsql::Row, idx: i32) -> i64 {
    row.get::<i64>(idx).unwrap_or_default()
}

pub(crate) fn get_i32(row: &libsql::Row, idx: i32, field: &str) -> Result<i32, DatabaseError> {
    i32::try_from(get_i64(row, idx))
        .map_err(|_| DatabaseError::Serialization(format!("{field} out of range")))
}

pub(crate) fn opt_text(value: Option<&str>) -> Value {
    match value {
        Some(text) => Value::Text(text.to_string()),
        None => Value::Null,
    }
}

pub(crate) fn opt_text_owned(value: Option<String>) -> Value {
    match value {
        Some(text) => Value::Text(text),
        None => Value::Null,
    }
}
