//! Shared fixtures for unit tests.

use std::sync::Arc;

use rust_decimal_macros::dec;

use crate::db::memory::InMemoryBackend;
use crate::db::{CreateAttorneyParams, Database, FeePackage, Location};

/// Fresh in-memory store with migrations applied.
pub(crate) async fn memory_db() -> Arc<dyn Database> {
    let backend = InMemoryBackend::new();
    backend
        .run_migrations()
        .await
        .expect("memory migrations should succeed");
    Arc::new(backend)
}

#[cfg(feature = "libsql")]
pub(crate) struct LibSqlFixture {
    pub backend: crate::db::libsql::LibSqlBackend,
    pub _tmpdir: tempfile::TempDir,
}

/// Temp-file libSQL database so every connection shares schema and state.
#[cfg(feature = "libsql")]
pub(crate) async fn setup_libsql() -> LibSqlFixture {
    let tmpdir = tempfile::tempdir().expect("tempdir");
    let db_path = tmpdir.path().join("counsel_desk_test.db");
    let backend = crate::db::libsql::LibSqlBackend::new_local(&db_path)
        .await
        .expect("local backend should initialize");
    backend
        .run_migrations()
        .await
        .expect("migrations should succeed");
    LibSqlFixture {
        backend,
        _tmpdir: tmpdir,
    }
}

/// libSQL-backed `Database`; keep the `TempDir` alive for the test's duration.
#[cfg(feature = "libsql")]
pub(crate) async fn test_db() -> (Arc<dyn Database>, tempfile::TempDir) {
    let fixture = setup_libsql().await;
    (Arc::new(fixture.backend), fixture._tmpdir)
}

/// Austin-based attorney billing 300/hour with one fixed package "X" at 1000.
pub(crate) fn attorney_params(email: &str, bar_association_id: &str) -> CreateAttorneyParams {
    CreateAttorneyParams {
        full_name: "Jordan Avery".to_string(),
        email: email.to_string(),
        bar_association_id: bar_association_id.to_string(),
        bio: "Business formation and contract disputes.".to_string(),
        education: "J.D., University of Texas".to_string(),
        years_of_experience: 12,
        practice_areas: vec!["Business Law".to_string(), "Contracts".to_string()],
        hourly_rate: dec!(300),
        fixed_fee_packages: vec![FeePackage {
            name: "X".to_string(),
            description: "Contract review".to_string(),
            price: dec!(1000),
        }],
        location: Location {
            city: "Austin".to_string(),
            state: "TX".to_string(),
            country: "USA".to_string(),
        },
        languages: vec!["English".to_string(), "Spanish".to_string()],
        profile_image: None,
        timezone: None,
    }
}
