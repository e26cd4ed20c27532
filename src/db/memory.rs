//! In-memory storage backend.
//!
//! All collections sit behind one lock so every trait method is a single
//! atomic step, matching the per-call atomicity of the libSQL backend. The
//! same unique rules are enforced and reported with the same index names.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::{
    ATTORNEY_BAR_ID_INDEX, ATTORNEY_EMAIL_INDEX, AttorneyRecord, AttorneySearch, AttorneyStore,
    CONSULTATION_SLOT_INDEX, ClientRecord, ClientStore, ConsultationRecord, ConsultationStatus,
    ConsultationStore, CreateAttorneyParams, CreateClientParams, CreateFileParams,
    CreateMessageParams, CreateReviewParams, Database, FileRecord, MatterRecord, MatterStore,
    MessageRecord, NewConsultationParams, RelayStore, ReviewRecord, ReviewStore,
    UpdateAttorneyParams, UpdateReviewParams,
};
use crate::error::DatabaseError;

#[derive(Default)]
struct Collections {
    attorneys: HashMap<Uuid, AttorneyRecord>,
    clients: HashMap<Uuid, ClientRecord>,
    matters: HashMap<Uuid, MatterRecord>,
    consultations: HashMap<Uuid, ConsultationRecord>,
    reviews: HashMap<Uuid, ReviewRecord>,
    messages: HashMap<Uuid, MessageRecord>,
    files: HashMap<Uuid, FileRecord>,
}

impl Collections {
    fn attorney_conflict(
        &self,
        skip: Option<Uuid>,
        email: &str,
        bar_association_id: &str,
    ) -> Option<&'static str> {
        let others = self
            .attorneys
            .values()
            .filter(|existing| Some(existing.id) != skip);
        for existing in others {
            if existing.email == email {
                return Some(ATTORNEY_EMAIL_INDEX);
            }
            if existing.bar_association_id == bar_association_id {
                return Some(ATTORNEY_BAR_ID_INDEX);
            }
        }
        None
    }

    fn slot_taken(&self, skip: Option<Uuid>, attorney_id: Uuid, slot_key: &str) -> bool {
        self.consultations.values().any(|existing| {
            Some(existing.id) != skip
                && existing.attorney_id == attorney_id
                && existing.slot_key == slot_key
                && existing.status.occupies_slot()
        })
    }
}

/// In-memory `Database` implementation.
#[derive(Default)]
pub struct InMemoryBackend {
    inner: RwLock<Collections>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    items.sort_by_key(|item| key(item));
    items
}

#[async_trait]
impl AttorneyStore for InMemoryBackend {
    async fn create_attorney(
        &self,
        input: &CreateAttorneyParams,
    ) -> Result<AttorneyRecord, DatabaseError> {
        let mut inner = self.inner.write().await;
        if let Some(index) = inner.attorney_conflict(None, &input.email, &input.bar_association_id)
        {
            return Err(DatabaseError::Constraint(index.to_string()));
        }
        let now = Utc::now();
        let record = AttorneyRecord {
            id: Uuid::new_v4(),
            full_name: input.full_name.clone(),
            email: input.email.clone(),
            bar_association_id: input.bar_association_id.clone(),
            bio: input.bio.clone(),
            education: input.education.clone(),
            years_of_experience: input.years_of_experience,
            practice_areas: input.practice_areas.clone(),
            hourly_rate: input.hourly_rate,
            fixed_fee_packages: input.fixed_fee_packages.clone(),
            location: input.location.clone(),
            languages: input.languages.clone(),
            is_verified: false,
            profile_image: input.profile_image.clone(),
            timezone: input.timezone.clone(),
            created_at: now,
            updated_at: now,
        };
        inner.attorneys.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_attorney(&self, id: Uuid) -> Result<Option<AttorneyRecord>, DatabaseError> {
        Ok(self.inner.read().await.attorneys.get(&id).cloned())
    }

    async fn get_attorney_by_email(
        &self,
        email: &str,
    ) -> Result<Option<AttorneyRecord>, DatabaseError> {
        let inner = self.inner.read().await;
        Ok(inner.attorneys.values().find(|a| a.email == email).cloned())
    }

    async fn get_attorney_by_bar_id(
        &self,
        bar_association_id: &str,
    ) -> Result<Option<AttorneyRecord>, DatabaseError> {
        let inner = self.inner.read().await;
        Ok(inner
            .attorneys
            .values()
            .find(|a| a.bar_association_id == bar_association_id)
            .cloned())
    }

    async fn search_attorneys(
        &self,
        filters: &AttorneySearch,
    ) -> Result<Vec<AttorneyRecord>, DatabaseError> {
        let inner = self.inner.read().await;
        let hits = inner
            .attorneys
            .values()
            .filter(|a| filters.matches(a))
            .cloned()
            .collect();
        Ok(sorted_by(hits, |a: &AttorneyRecord| a.full_name.clone()))
    }

    async fn update_attorney(
        &self,
        id: Uuid,
        input: &UpdateAttorneyParams,
    ) -> Result<Option<AttorneyRecord>, DatabaseError> {
        let mut inner = self.inner.write().await;
        let Some(existing) = inner.attorneys.get(&id).cloned() else {
            return Ok(None);
        };

        let email = input.email.clone().unwrap_or(existing.email);
        let bar_association_id = input
            .bar_association_id
            .clone()
            .unwrap_or(existing.bar_association_id);
        if let Some(index) = inner.attorney_conflict(Some(id), &email, &bar_association_id) {
            return Err(DatabaseError::Constraint(index.to_string()));
        }

        let merged = AttorneyRecord {
            id,
            full_name: input.full_name.clone().unwrap_or(existing.full_name),
            email,
            bar_association_id,
            bio: input.bio.clone().unwrap_or(existing.bio),
            education: input.education.clone().unwrap_or(existing.education),
            years_of_experience: input
                .years_of_experience
                .unwrap_or(existing.years_of_experience),
            practice_areas: input
                .practice_areas
                .clone()
                .unwrap_or(existing.practice_areas),
            hourly_rate: input.hourly_rate.unwrap_or(existing.hourly_rate),
            fixed_fee_packages: input
                .fixed_fee_packages
                .clone()
                .unwrap_or(existing.fixed_fee_packages),
            location: input.location.clone().unwrap_or(existing.location),
            languages: input.languages.clone().unwrap_or(existing.languages),
            is_verified: existing.is_verified,
            profile_image: input
                .profile_image
                .clone()
                .unwrap_or(existing.profile_image),
            timezone: input.timezone.clone().unwrap_or(existing.timezone),
            created_at: existing.created_at,
            updated_at: Utc::now(),
        };
        inner.attorneys.insert(id, merged.clone());
        Ok(Some(merged))
    }

    async fn set_attorney_verified(
        &self,
        id: Uuid,
        verified: bool,
    ) -> Result<Option<AttorneyRecord>, DatabaseError> {
        let mut inner = self.inner.write().await;
        Ok(inner.attorneys.get_mut(&id).map(|attorney| {
            attorney.is_verified = verified;
            attorney.updated_at = Utc::now();
            attorney.clone()
        }))
    }
}

#[async_trait]
impl ClientStore for InMemoryBackend {
    async fn upsert_client_by_email(
        &self,
        input: &CreateClientParams,
    ) -> Result<ClientRecord, DatabaseError> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.clients.values().find(|c| c.email == input.email) {
            return Ok(existing.clone());
        }
        let now = Utc::now();
        let record = ClientRecord {
            id: Uuid::new_v4(),
            full_name: input.full_name.clone(),
            email: input.email.clone(),
            phone: input.phone.clone(),
            created_at: now,
            updated_at: now,
        };
        inner.clients.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_client(&self, id: Uuid) -> Result<Option<ClientRecord>, DatabaseError> {
        Ok(self.inner.read().await.clients.get(&id).cloned())
    }

    async fn get_client_by_email(
        &self,
        email: &str,
    ) -> Result<Option<ClientRecord>, DatabaseError> {
        let inner = self.inner.read().await;
        Ok(inner.clients.values().find(|c| c.email == email).cloned())
    }
}

#[async_trait]
impl MatterStore for InMemoryBackend {
    async fn find_matter(
        &self,
        attorney_id: Uuid,
        client_id: Uuid,
    ) -> Result<Option<MatterRecord>, DatabaseError> {
        let inner = self.inner.read().await;
        Ok(inner
            .matters
            .values()
            .find(|m| m.attorney_id == attorney_id && m.client_id == client_id)
            .cloned())
    }

    async fn ensure_matter(
        &self,
        attorney_id: Uuid,
        client_id: Uuid,
    ) -> Result<MatterRecord, DatabaseError> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner
            .matters
            .values()
            .find(|m| m.attorney_id == attorney_id && m.client_id == client_id)
        {
            return Ok(existing.clone());
        }
        let now = Utc::now();
        let record = MatterRecord {
            id: Uuid::new_v4(),
            attorney_id,
            client_id,
            title: None,
            last_message_at: None,
            created_at: now,
            updated_at: now,
        };
        inner.matters.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_matter(&self, id: Uuid) -> Result<Option<MatterRecord>, DatabaseError> {
        Ok(self.inner.read().await.matters.get(&id).cloned())
    }

    async fn list_matters_for_attorney(
        &self,
        attorney_id: Uuid,
    ) -> Result<Vec<MatterRecord>, DatabaseError> {
        let inner = self.inner.read().await;
        let mut matters: Vec<MatterRecord> = inner
            .matters
            .values()
            .filter(|m| m.attorney_id == attorney_id)
            .cloned()
            .collect();
        matters.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(matters)
    }

    async fn list_matters_for_client(
        &self,
        client_id: Uuid,
    ) -> Result<Vec<MatterRecord>, DatabaseError> {
        let inner = self.inner.read().await;
        let mut matters: Vec<MatterRecord> = inner
            .matters
            .values()
            .filter(|m| m.client_id == client_id)
            .cloned()
            .collect();
        matters.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(matters)
    }

    async fn set_matter_title(
        &self,
        id: Uuid,
        title: Option<&str>,
    ) -> Result<Option<MatterRecord>, DatabaseError> {
        let mut inner = self.inner.write().await;
        Ok(inner.matters.get_mut(&id).map(|matter| {
            matter.title = title.map(str::to_string);
            matter.updated_at = Utc::now();
            matter.clone()
        }))
    }

    async fn touch_matter(
        &self,
        id: Uuid,
        last_message_at: Option<DateTime<Utc>>,
    ) -> Result<bool, DatabaseError> {
        let mut inner = self.inner.write().await;
        let Some(matter) = inner.matters.get_mut(&id) else {
            return Ok(false);
        };
        matter.updated_at = Utc::now();
        if last_message_at.is_some() {
            matter.last_message_at = last_message_at;
        }
        Ok(true)
    }
}

#[async_trait]
impl ConsultationStore for InMemoryBackend {
    async fn insert_consultation(
        &self,
        input: &NewConsultationParams,
    ) -> Result<ConsultationRecord, DatabaseError> {
        let mut inner = self.inner.write().await;
        if inner.slot_taken(None, input.attorney_id, &input.slot_key) {
            return Err(DatabaseError::Constraint(
                CONSULTATION_SLOT_INDEX.to_string(),
            ));
        }
        let now = Utc::now();
        let record = ConsultationRecord {
            id: Uuid::new_v4(),
            attorney_id: input.attorney_id,
            client_id: input.client_id,
            matter_id: input.matter_id,
            scheduled_at: input.scheduled_at,
            duration_minutes: input.duration_minutes,
            price: input.price,
            status: ConsultationStatus::Pending,
            consultation_type: input.consultation_type,
            package_id: input.package_id.clone(),
            notes: input.notes.clone(),
            slot_key: input.slot_key.clone(),
            created_at: now,
            updated_at: now,
        };
        inner.consultations.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_consultation(
        &self,
        id: Uuid,
    ) -> Result<Option<ConsultationRecord>, DatabaseError> {
        Ok(self.inner.read().await.consultations.get(&id).cloned())
    }

    async fn list_attorney_consultations_between(
        &self,
        attorney_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ConsultationRecord>, DatabaseError> {
        let inner = self.inner.read().await;
        let hits = inner
            .consultations
            .values()
            .filter(|c| c.attorney_id == attorney_id)
            .filter(|c| c.scheduled_at >= start && c.scheduled_at <= end)
            .cloned()
            .collect();
        Ok(sorted_by(hits, |c: &ConsultationRecord| c.scheduled_at))
    }

    async fn list_consultations_for_attorney(
        &self,
        attorney_id: Uuid,
    ) -> Result<Vec<ConsultationRecord>, DatabaseError> {
        let inner = self.inner.read().await;
        let hits = inner
            .consultations
            .values()
            .filter(|c| c.attorney_id == attorney_id)
            .cloned()
            .collect();
        Ok(sorted_by(hits, |c: &ConsultationRecord| c.scheduled_at))
    }

    async fn list_consultations_for_client(
        &self,
        client_id: Uuid,
    ) -> Result<Vec<ConsultationRecord>, DatabaseError> {
        let inner = self.inner.read().await;
        let hits = inner
            .consultations
            .values()
            .filter(|c| c.client_id == client_id)
            .cloned()
            .collect();
        Ok(sorted_by(hits, |c: &ConsultationRecord| c.scheduled_at))
    }

    async fn list_consultations_for_matter(
        &self,
        matter_id: Uuid,
    ) -> Result<Vec<ConsultationRecord>, DatabaseError> {
        let inner = self.inner.read().await;
        let hits = inner
            .consultations
            .values()
            .filter(|c| c.matter_id == matter_id)
            .cloned()
            .collect();
        Ok(sorted_by(hits, |c: &ConsultationRecord| c.scheduled_at))
    }

    async fn set_consultation_status(
        &self,
        id: Uuid,
        status: ConsultationStatus,
    ) -> Result<Option<ConsultationRecord>, DatabaseError> {
        let mut inner = self.inner.write().await;
        let Some(existing) = inner.consultations.get(&id) else {
            return Ok(None);
        };
        let (attorney_id, slot_key) = (existing.attorney_id, existing.slot_key.clone());
        if status.occupies_slot() && inner.slot_taken(Some(id), attorney_id, &slot_key) {
            return Err(DatabaseError::Constraint(
                CONSULTATION_SLOT_INDEX.to_string(),
            ));
        }
        Ok(inner.consultations.get_mut(&id).map(|consultation| {
            consultation.status = status;
            consultation.updated_at = Utc::now();
            consultation.clone()
        }))
    }
}

#[async_trait]
impl ReviewStore for InMemoryBackend {
    async fn create_review(
        &self,
        input: &CreateReviewParams,
    ) -> Result<ReviewRecord, DatabaseError> {
        let now = Utc::now();
        let record = ReviewRecord {
            id: Uuid::new_v4(),
            attorney_id: input.attorney_id,
            client_name: input.client_name.clone(),
            client_email: input.client_email.clone(),
            rating: input.rating,
            comment: input.comment.clone(),
            created_at: now,
            updated_at: now,
        };
        self.inner
            .write()
            .await
            .reviews
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_review(&self, id: Uuid) -> Result<Option<ReviewRecord>, DatabaseError> {
        Ok(self.inner.read().await.reviews.get(&id).cloned())
    }

    async fn list_reviews_for_attorney(
        &self,
        attorney_id: Uuid,
    ) -> Result<Vec<ReviewRecord>, DatabaseError> {
        let inner = self.inner.read().await;
        let mut reviews: Vec<ReviewRecord> = inner
            .reviews
            .values()
            .filter(|r| r.attorney_id == attorney_id)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    async fn list_reviews_by_email(
        &self,
        email: &str,
    ) -> Result<Vec<ReviewRecord>, DatabaseError> {
        let inner = self.inner.read().await;
        let mut reviews: Vec<ReviewRecord> = inner
            .reviews
            .values()
            .filter(|r| r.client_email == email)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    async fn update_review(
        &self,
        id: Uuid,
        input: &UpdateReviewParams,
    ) -> Result<Option<ReviewRecord>, DatabaseError> {
        let mut inner = self.inner.write().await;
        Ok(inner.reviews.get_mut(&id).map(|review| {
            if let Some(rating) = input.rating {
                review.rating = rating;
            }
            if let Some(comment) = &input.comment {
                review.comment = comment.clone();
            }
            review.updated_at = Utc::now();
            review.clone()
        }))
    }

    async fn delete_review(&self, id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self.inner.write().await.reviews.remove(&id).is_some())
    }
}

#[async_trait]
impl RelayStore for InMemoryBackend {
    async fn create_message(
        &self,
        input: &CreateMessageParams,
    ) -> Result<MessageRecord, DatabaseError> {
        let now = Utc::now();
        let record = MessageRecord {
            id: Uuid::new_v4(),
            matter_id: input.matter_id,
            sender: input.sender,
            sender_id: input.sender_id,
            content: input.content.clone(),
            created_at: now,
            updated_at: now,
        };
        self.inner
            .write()
            .await
            .messages
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_messages(&self, matter_id: Uuid) -> Result<Vec<MessageRecord>, DatabaseError> {
        let inner = self.inner.read().await;
        let hits = inner
            .messages
            .values()
            .filter(|m| m.matter_id == matter_id)
            .cloned()
            .collect();
        Ok(sorted_by(hits, |m: &MessageRecord| m.created_at))
    }

    async fn create_file(&self, input: &CreateFileParams) -> Result<FileRecord, DatabaseError> {
        let now = Utc::now();
        let record = FileRecord {
            id: Uuid::new_v4(),
            matter_id: input.matter_id,
            uploaded_by: input.uploaded_by,
            file_name: input.file_name.clone(),
            content_type: input.content_type.clone(),
            size_bytes: input.size_bytes,
            storage_key: input.storage_key.clone(),
            created_at: now,
            updated_at: now,
        };
        self.inner
            .write()
            .await
            .files
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_files(&self, matter_id: Uuid) -> Result<Vec<FileRecord>, DatabaseError> {
        let inner = self.inner.read().await;
        let mut files: Vec<FileRecord> = inner
            .files
            .values()
            .filter(|f| f.matter_id == matter_id)
            .cloned()
            .collect();
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(files)
    }
}

#[async_trait]
impl Database for InMemoryBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    use super::*;
    use crate::db::ConsultationType;
    use crate::testing::attorney_params;

    fn consultation(attorney_id: Uuid, slot_key: &str) -> NewConsultationParams {
        NewConsultationParams {
            attorney_id,
            client_id: Uuid::new_v4(),
            matter_id: Uuid::new_v4(),
            scheduled_at: Utc
                .with_ymd_and_hms(2030, 5, 6, 10, 0, 0)
                .single()
                .expect("valid timestamp"),
            duration_minutes: 60,
            price: Decimal::ZERO,
            consultation_type: ConsultationType::Hourly,
            package_id: None,
            notes: None,
            slot_key: slot_key.to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_attorney_email_reports_email_index() {
        let db = InMemoryBackend::new();
        db.create_attorney(&attorney_params("a@firm.test", "BAR-1"))
            .await
            .expect("first attorney");
        let err = db
            .create_attorney(&attorney_params("a@firm.test", "BAR-2"))
            .await
            .expect_err("duplicate email");
        assert!(matches!(err, DatabaseError::Constraint(index) if index == ATTORNEY_EMAIL_INDEX));
    }

    #[tokio::test]
    async fn slot_index_ignores_cancelled_rows() {
        let db = InMemoryBackend::new();
        let attorney_id = Uuid::new_v4();
        let first = db
            .insert_consultation(&consultation(attorney_id, "2030-05-06T10"))
            .await
            .expect("first insert");

        let err = db
            .insert_consultation(&consultation(attorney_id, "2030-05-06T10"))
            .await
            .expect_err("slot taken");
        assert!(matches!(err, DatabaseError::Constraint(_)));

        db.set_consultation_status(first.id, ConsultationStatus::Cancelled)
            .await
            .expect("cancel");
        let second = db
            .insert_consultation(&consultation(attorney_id, "2030-05-06T10"))
            .await
            .expect("slot freed by cancellation");

        let revive = db
            .set_consultation_status(first.id, ConsultationStatus::Confirmed)
            .await;
        assert!(revive.is_err(), "reviving into a taken slot must fail");
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn ensure_matter_is_idempotent_per_pair() {
        let db = InMemoryBackend::new();
        let (attorney, client) = (Uuid::new_v4(), Uuid::new_v4());
        let a = db.ensure_matter(attorney, client).await.expect("first");
        let b = db.ensure_matter(attorney, client).await.expect("second");
        assert_eq!(a.id, b.id);
        let other = db
            .ensure_matter(attorney, Uuid::new_v4())
            .await
            .expect("other client");
        assert_ne!(a.id, other.id);
    }
}
