//! Database abstraction layer.
//!
//! Provides a backend-agnostic `Database` trait that unifies all persistence
//! operations. Two implementations exist:
//!
//! - `libsql` (default feature): libSQL (Turso's SQLite fork) for embedded use
//! - `memory`: `RwLock`-guarded collections, used by tests and throwaway runs
//!
//! Every method is a single atomic store call. Multi-step workflows (booking)
//! live in the service layer and are built from idempotent steps.

#[cfg(feature = "libsql")]
pub mod libsql;

#[cfg(feature = "libsql")]
pub mod libsql_migrations;

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{DatabaseBackend, DatabaseConfig};
use crate::error::DatabaseError;

/// Unique index names reported through `DatabaseError::Constraint`.
pub const ATTORNEY_EMAIL_INDEX: &str = "idx_attorneys_email";
pub const ATTORNEY_BAR_ID_INDEX: &str = "idx_attorneys_bar_association_id";
pub const CLIENT_EMAIL_INDEX: &str = "idx_clients_email";
pub const MATTER_PAIR_INDEX: &str = "idx_matters_attorney_client";
pub const CONSULTATION_SLOT_INDEX: &str = "idx_consultations_active_slot";

/// Create a database backend from configuration, run migrations, and return it.
pub async fn connect_from_config(
    config: &DatabaseConfig,
) -> Result<Arc<dyn Database>, DatabaseError> {
    match config.backend {
        #[cfg(feature = "libsql")]
        DatabaseBackend::LibSql => {
            let backend = libsql::LibSqlBackend::new_local(&config.libsql_path).await?;
            backend.run_migrations().await?;
            Ok(Arc::new(backend))
        }
        #[cfg(not(feature = "libsql"))]
        DatabaseBackend::LibSql => Err(DatabaseError::Pool(
            "libSQL backend not compiled in. Enable the 'libsql' feature.".to_string(),
        )),
        DatabaseBackend::Memory => {
            let backend = memory::InMemoryBackend::new();
            backend.run_migrations().await?;
            Ok(Arc::new(backend))
        }
    }
}

/// Consultation lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsultationStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl ConsultationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Whether the consultation still holds its slot.
    pub fn occupies_slot(self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

/// How a consultation is priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsultationType {
    Hourly,
    Fixed,
}

impl ConsultationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Fixed => "fixed",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "hourly" => Some(Self::Hourly),
            "fixed" => Some(Self::Fixed),
            _ => None,
        }
    }
}

/// Which side of a matter authored a message or uploaded a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Participant {
    Attorney,
    Client,
}

impl Participant {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Attorney => "attorney",
            Self::Client => "client",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "attorney" => Some(Self::Attorney),
            "client" => Some(Self::Client),
            _ => None,
        }
    }
}

/// Named, pre-priced offering. `name` is the lookup key within one attorney.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeePackage {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub state: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttorneyRecord {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub bar_association_id: String,
    pub bio: String,
    pub education: String,
    pub years_of_experience: i32,
    pub practice_areas: Vec<String>,
    pub hourly_rate: Decimal,
    pub fixed_fee_packages: Vec<FeePackage>,
    pub location: Location,
    pub languages: Vec<String>,
    pub is_verified: bool,
    pub profile_image: Option<String>,
    /// Declared UTC offset such as `-05:00`. `None` means the configured default.
    pub timezone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttorneyRecord {
    pub fn package(&self, name: &str) -> Option<&FeePackage> {
        self.fixed_fee_packages.iter().find(|pkg| pkg.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct CreateAttorneyParams {
    pub full_name: String,
    pub email: String,
    pub bar_association_id: String,
    pub bio: String,
    pub education: String,
    pub years_of_experience: i32,
    pub practice_areas: Vec<String>,
    pub hourly_rate: Decimal,
    pub fixed_fee_packages: Vec<FeePackage>,
    pub location: Location,
    pub languages: Vec<String>,
    pub profile_image: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateAttorneyParams {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub bar_association_id: Option<String>,
    pub bio: Option<String>,
    pub education: Option<String>,
    pub years_of_experience: Option<i32>,
    pub practice_areas: Option<Vec<String>>,
    pub hourly_rate: Option<Decimal>,
    pub fixed_fee_packages: Option<Vec<FeePackage>>,
    pub location: Option<Location>,
    pub languages: Option<Vec<String>>,
    pub profile_image: Option<Option<String>>,
    pub timezone: Option<Option<String>>,
}

/// Directory search filters. Every set filter must match.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttorneySearch {
    pub practice_area: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    #[serde(default)]
    pub verified_only: bool,
    pub query: Option<String>,
}

impl AttorneySearch {
    /// Backend-neutral filter, shared so both stores agree on matching rules.
    pub fn matches(&self, attorney: &AttorneyRecord) -> bool {
        if self.verified_only && !attorney.is_verified {
            return false;
        }
        if let Some(area) = non_blank(self.practice_area.as_deref())
            && !attorney
                .practice_areas
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(area))
        {
            return false;
        }
        if let Some(city) = non_blank(self.city.as_deref())
            && !attorney.location.city.eq_ignore_ascii_case(city)
        {
            return false;
        }
        if let Some(state) = non_blank(self.state.as_deref())
            && !attorney.location.state.eq_ignore_ascii_case(state)
        {
            return false;
        }
        if let Some(query) = non_blank(self.query.as_deref()) {
            let needle = query.to_lowercase();
            if !attorney.full_name.to_lowercase().contains(&needle)
                && !attorney.bio.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateClientParams {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatterRecord {
    pub id: Uuid,
    pub attorney_id: Uuid,
    pub client_id: Uuid,
    pub title: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationRecord {
    pub id: Uuid,
    pub attorney_id: Uuid,
    pub client_id: Uuid,
    pub matter_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub price: Decimal,
    pub status: ConsultationStatus,
    pub consultation_type: ConsultationType,
    pub package_id: Option<String>,
    pub notes: Option<String>,
    /// Attorney-local `YYYY-MM-DDTHH` the consultation occupies.
    pub slot_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewConsultationParams {
    pub attorney_id: Uuid,
    pub client_id: Uuid,
    pub matter_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub price: Decimal,
    pub consultation_type: ConsultationType,
    pub package_id: Option<String>,
    pub notes: Option<String>,
    pub slot_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: Uuid,
    pub attorney_id: Uuid,
    pub client_name: String,
    pub client_email: String,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateReviewParams {
    pub attorney_id: Uuid,
    pub client_name: String,
    pub client_email: String,
    pub rating: i32,
    pub comment: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateReviewParams {
    pub rating: Option<i32>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: Uuid,
    pub matter_id: Uuid,
    pub sender: Participant,
    pub sender_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateMessageParams {
    pub matter_id: Uuid,
    pub sender: Participant,
    pub sender_id: Uuid,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub matter_id: Uuid,
    pub uploaded_by: Participant,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateFileParams {
    pub matter_id: Uuid,
    pub uploaded_by: Participant,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_key: String,
}

// ==================== Sub-traits ====================
//
// Each sub-trait groups one collection. The `Database` supertrait combines
// them, so services hold a single `Arc<dyn Database>`.

#[async_trait]
pub trait AttorneyStore: Send + Sync {
    /// Fails with `Constraint` on a duplicate email or bar association ID.
    async fn create_attorney(
        &self,
        input: &CreateAttorneyParams,
    ) -> Result<AttorneyRecord, DatabaseError>;
    async fn get_attorney(&self, id: Uuid) -> Result<Option<AttorneyRecord>, DatabaseError>;
    async fn get_attorney_by_email(
        &self,
        email: &str,
    ) -> Result<Option<AttorneyRecord>, DatabaseError>;
    async fn get_attorney_by_bar_id(
        &self,
        bar_association_id: &str,
    ) -> Result<Option<AttorneyRecord>, DatabaseError>;
    async fn search_attorneys(
        &self,
        filters: &AttorneySearch,
    ) -> Result<Vec<AttorneyRecord>, DatabaseError>;
    async fn update_attorney(
        &self,
        id: Uuid,
        input: &UpdateAttorneyParams,
    ) -> Result<Option<AttorneyRecord>, DatabaseError>;
    async fn set_attorney_verified(
        &self,
        id: Uuid,
        verified: bool,
    ) -> Result<Option<AttorneyRecord>, DatabaseError>;
}

#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Insert the client, or return the existing row for this exact email.
    async fn upsert_client_by_email(
        &self,
        input: &CreateClientParams,
    ) -> Result<ClientRecord, DatabaseError>;
    async fn get_client(&self, id: Uuid) -> Result<Option<ClientRecord>, DatabaseError>;
    async fn get_client_by_email(&self, email: &str)
    -> Result<Option<ClientRecord>, DatabaseError>;
}

#[async_trait]
pub trait MatterStore: Send + Sync {
    async fn find_matter(
        &self,
        attorney_id: Uuid,
        client_id: Uuid,
    ) -> Result<Option<MatterRecord>, DatabaseError>;
    /// Insert a matter for the pair, or return the one that already exists.
    async fn ensure_matter(
        &self,
        attorney_id: Uuid,
        client_id: Uuid,
    ) -> Result<MatterRecord, DatabaseError>;
    async fn get_matter(&self, id: Uuid) -> Result<Option<MatterRecord>, DatabaseError>;
    async fn list_matters_for_attorney(
        &self,
        attorney_id: Uuid,
    ) -> Result<Vec<MatterRecord>, DatabaseError>;
    async fn list_matters_for_client(
        &self,
        client_id: Uuid,
    ) -> Result<Vec<MatterRecord>, DatabaseError>;
    async fn set_matter_title(
        &self,
        id: Uuid,
        title: Option<&str>,
    ) -> Result<Option<MatterRecord>, DatabaseError>;
    /// Bump `updated_at`, and `last_message_at` when given. Returns false if absent.
    async fn touch_matter(
        &self,
        id: Uuid,
        last_message_at: Option<DateTime<Utc>>,
    ) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait ConsultationStore: Send + Sync {
    /// Conditional insert: fails with `Constraint(CONSULTATION_SLOT_INDEX)`
    /// when a non-cancelled consultation already holds the slot key.
    async fn insert_consultation(
        &self,
        input: &NewConsultationParams,
    ) -> Result<ConsultationRecord, DatabaseError>;
    async fn get_consultation(&self, id: Uuid)
    -> Result<Option<ConsultationRecord>, DatabaseError>;
    /// All statuses, `start <= scheduled_at <= end`, ascending.
    async fn list_attorney_consultations_between(
        &self,
        attorney_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ConsultationRecord>, DatabaseError>;
    async fn list_consultations_for_attorney(
        &self,
        attorney_id: Uuid,
    ) -> Result<Vec<ConsultationRecord>, DatabaseError>;
    async fn list_consultations_for_client(
        &self,
        client_id: Uuid,
    ) -> Result<Vec<ConsultationRecord>, DatabaseError>;
    async fn list_consultations_for_matter(
        &self,
        matter_id: Uuid,
    ) -> Result<Vec<ConsultationRecord>, DatabaseError>;
    /// Fails with `Constraint(CONSULTATION_SLOT_INDEX)` when reviving a
    /// cancelled consultation into a slot that is now taken.
    async fn set_consultation_status(
        &self,
        id: Uuid,
        status: ConsultationStatus,
    ) -> Result<Option<ConsultationRecord>, DatabaseError>;
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    async fn create_review(&self, input: &CreateReviewParams)
    -> Result<ReviewRecord, DatabaseError>;
    async fn get_review(&self, id: Uuid) -> Result<Option<ReviewRecord>, DatabaseError>;
    async fn list_reviews_for_attorney(
        &self,
        attorney_id: Uuid,
    ) -> Result<Vec<ReviewRecord>, DatabaseError>;
    async fn list_reviews_by_email(&self, email: &str)
    -> Result<Vec<ReviewRecord>, DatabaseError>;
    async fn update_review(
        &self,
        id: Uuid,
        input: &UpdateReviewParams,
    ) -> Result<Option<ReviewRecord>, DatabaseError>;
    async fn delete_review(&self, id: Uuid) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait RelayStore: Send + Sync {
    async fn create_message(
        &self,
        input: &CreateMessageParams,
    ) -> Result<MessageRecord, DatabaseError>;
    async fn list_messages(&self, matter_id: Uuid) -> Result<Vec<MessageRecord>, DatabaseError>;
    async fn create_file(&self, input: &CreateFileParams) -> Result<FileRecord, DatabaseError>;
    async fn list_files(&self, matter_id: Uuid) -> Result<Vec<FileRecord>, DatabaseError>;
}

/// Backend-agnostic database supertrait.
#[async_trait]
pub trait Database:
    AttorneyStore + ClientStore + MatterStore + ConsultationStore + ReviewStore + RelayStore + Send + Sync
{
    /// Run schema migrations for this backend.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;
}
