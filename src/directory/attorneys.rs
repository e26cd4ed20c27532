use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::config::parse_utc_offset;
use crate::db::{
    ATTORNEY_BAR_ID_INDEX, ATTORNEY_EMAIL_INDEX, AttorneyRecord, AttorneySearch,
    CreateAttorneyParams, Database, UpdateAttorneyParams,
};
use crate::error::{DatabaseError, ServiceError, ServiceResult};

pub const EMAIL_TAKEN: &str = "An attorney with this email already exists";
pub const BAR_ID_TAKEN: &str = "An attorney with this bar association ID already exists";
pub const TIMEZONE_LOCKED: &str =
    "Cannot change timezone while consultations are booked; cancel them first";

/// Slot keys are local dates, and two offsets differ by less than two days, so
/// a booking older than this can never share a key with a future booking.
const SLOT_KEY_DRIFT_DAYS: i64 = 3;

/// Attorney profiles: registration, lookup, edits, verification, search.
pub struct AttorneyDirectory {
    db: Arc<dyn Database>,
}

fn required(field: &str, value: &str) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn check_rate(rate: Decimal) -> ServiceResult<()> {
    if rate < Decimal::ZERO {
        return Err(ServiceError::validation("Hourly rate cannot be negative"));
    }
    Ok(())
}

fn check_experience(years: i32) -> ServiceResult<()> {
    if years < 0 {
        return Err(ServiceError::validation(
            "Years of experience cannot be negative",
        ));
    }
    Ok(())
}

/// Blank means "not declared"; anything else must parse as an offset.
fn normalize_timezone(raw: Option<&str>) -> ServiceResult<Option<String>> {
    match raw.map(str::trim).filter(|tz| !tz.is_empty()) {
        None => Ok(None),
        Some(tz) if parse_utc_offset(tz).is_some() => Ok(Some(tz.to_string())),
        Some(tz) => Err(ServiceError::validation(format!(
            "Timezone '{tz}' must be a UTC offset such as -05:00"
        ))),
    }
}

fn map_unique(err: DatabaseError) -> ServiceError {
    match err {
        DatabaseError::Constraint(index) if index == ATTORNEY_EMAIL_INDEX => {
            ServiceError::validation(EMAIL_TAKEN)
        }
        DatabaseError::Constraint(index) if index == ATTORNEY_BAR_ID_INDEX => {
            ServiceError::validation(BAR_ID_TAKEN)
        }
        other => ServiceError::Database(other),
    }
}

impl AttorneyDirectory {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    pub async fn register(&self, input: CreateAttorneyParams) -> ServiceResult<AttorneyRecord> {
        let params = CreateAttorneyParams {
            full_name: required("Full name", &input.full_name)?,
            email: required("Email", &input.email)?,
            bar_association_id: required("Bar association ID", &input.bar_association_id)?,
            timezone: normalize_timezone(input.timezone.as_deref())?,
            ..input
        };
        check_rate(params.hourly_rate)?;
        check_experience(params.years_of_experience)?;

        if self.db.get_attorney_by_email(&params.email).await?.is_some() {
            return Err(ServiceError::validation(EMAIL_TAKEN));
        }
        if self
            .db
            .get_attorney_by_bar_id(&params.bar_association_id)
            .await?
            .is_some()
        {
            return Err(ServiceError::validation(BAR_ID_TAKEN));
        }

        let attorney = self.db.create_attorney(&params).await.map_err(map_unique)?;
        tracing::info!(attorney_id = %attorney.id, "attorney registered");
        Ok(attorney)
    }

    pub async fn get(&self, id: Uuid) -> ServiceResult<AttorneyRecord> {
        self.db
            .get_attorney(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Attorney"))
    }

    pub async fn get_by_email(&self, email: &str) -> ServiceResult<Option<AttorneyRecord>> {
        Ok(self.db.get_attorney_by_email(email.trim()).await?)
    }

    pub async fn update(
        &self,
        id: Uuid,
        mut patch: UpdateAttorneyParams,
    ) -> ServiceResult<AttorneyRecord> {
        let current = self.get(id).await?;

        if let Some(name) = patch.full_name.as_deref() {
            patch.full_name = Some(required("Full name", name)?);
        }
        if let Some(email) = patch.email.as_deref() {
            let email = required("Email", email)?;
            if email != current.email
                && self
                    .db
                    .get_attorney_by_email(&email)
                    .await?
                    .is_some_and(|other| other.id != id)
            {
                return Err(ServiceError::validation(EMAIL_TAKEN));
            }
            patch.email = Some(email);
        }
        if let Some(bar_id) = patch.bar_association_id.as_deref() {
            let bar_id = required("Bar association ID", bar_id)?;
            if bar_id != current.bar_association_id
                && self
                    .db
                    .get_attorney_by_bar_id(&bar_id)
                    .await?
                    .is_some_and(|other| other.id != id)
            {
                return Err(ServiceError::validation(BAR_ID_TAKEN));
            }
            patch.bar_association_id = Some(bar_id);
        }
        if let Some(rate) = patch.hourly_rate {
            check_rate(rate)?;
        }
        if let Some(years) = patch.years_of_experience {
            check_experience(years)?;
        }
        if let Some(timezone) = patch.timezone.take() {
            let timezone = normalize_timezone(timezone.as_deref())?;
            let offset_moves = timezone.as_deref().and_then(parse_utc_offset)
                != current.timezone.as_deref().and_then(parse_utc_offset);
            if offset_moves {
                self.ensure_no_keyed_bookings(id).await?;
            }
            patch.timezone = Some(timezone);
        }

        let updated = self
            .db
            .update_attorney(id, &patch)
            .await
            .map_err(map_unique)?
            .ok_or_else(|| ServiceError::not_found("Attorney"))?;
        tracing::info!(attorney_id = %id, "attorney profile updated");
        Ok(updated)
    }

    /// Stored slot keys were derived from the current offset; refuse to move
    /// it while any of them could still collide with a new booking.
    async fn ensure_no_keyed_bookings(&self, id: Uuid) -> ServiceResult<()> {
        let cutoff = Utc::now() - Duration::days(SLOT_KEY_DRIFT_DAYS);
        let keyed = self
            .db
            .list_consultations_for_attorney(id)
            .await?
            .iter()
            .any(|c| c.status.occupies_slot() && c.scheduled_at >= cutoff);
        if keyed {
            tracing::debug!(attorney_id = %id, "timezone change refused");
            return Err(ServiceError::InvalidState(TIMEZONE_LOCKED.to_string()));
        }
        Ok(())
    }

    pub async fn verify(&self, id: Uuid, verified: bool) -> ServiceResult<AttorneyRecord> {
        let attorney = self
            .db
            .set_attorney_verified(id, verified)
            .await?
            .ok_or_else(|| ServiceError::not_found("Attorney"))?;
        tracing::info!(attorney_id = %id, verified, "attorney verification changed");
        Ok(attorney)
    }

    /// Matching attorneys ordered by name.
    pub async fn search(&self, filters: &AttorneySearch) -> ServiceResult<Vec<AttorneyRecord>> {
        let mut hits = self.db.search_attorneys(filters).await?;
        hits.sort_by(|a, b| {
            a.full_name
                .to_lowercase()
                .cmp(&b.full_name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(hits)
    }
}
