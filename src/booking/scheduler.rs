//! Consultation scheduling.
//!
//! Availability and conflicts are computed on whole attorney-local hours: a
//! consultation occupies only the hour it starts in, whatever its duration.
//! The in-process conflict check gives the friendly error; the store's
//! slot-key uniqueness on insert is what actually prevents double booking.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::pricing::{self, PriceBasis};
use crate::booking::reconcile;
use crate::booking::slots::{self, Slot};
use crate::config::{BookingConfig, parse_utc_offset};
use crate::db::{
    AttorneyRecord, CONSULTATION_SLOT_INDEX, ConsultationRecord, ConsultationStatus,
    ConsultationType, Database, NewConsultationParams,
};
use crate::error::{DatabaseError, ServiceError, ServiceResult};

pub const SLOT_TAKEN: &str = "This time slot is already booked";
pub const BOOKED: &str = "Consultation booked successfully";
pub const PRICE_OUT_OF_RANGE: &str = "Consultation price is out of range";
const UNKNOWN_CLIENT: &str = "Unknown Client";

/// Everything a client submits to book a consultation.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub attorney_id: Uuid,
    pub client_name: String,
    pub client_email: String,
    #[serde(default)]
    pub client_phone: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    #[serde(alias = "duration")]
    pub duration_minutes: i32,
    pub consultation_type: ConsultationType,
    #[serde(default)]
    pub package_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingReceipt {
    pub success: bool,
    pub id: Uuid,
    pub message: String,
}

/// A consultation in an attorney's upcoming list.
#[derive(Debug, Clone, Serialize)]
pub struct UpcomingConsultation {
    #[serde(flatten)]
    pub consultation: ConsultationRecord,
    pub client_name: String,
    pub end_time: DateTime<Utc>,
}

pub struct Scheduler {
    db: Arc<dyn Database>,
    config: BookingConfig,
}

impl Scheduler {
    pub fn new(db: Arc<dyn Database>, config: BookingConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &BookingConfig {
        &self.config
    }

    async fn require_attorney(&self, attorney_id: Uuid) -> ServiceResult<AttorneyRecord> {
        self.db
            .get_attorney(attorney_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Attorney"))
    }

    /// The attorney's declared offset, or the configured default.
    fn attorney_offset(&self, attorney: &AttorneyRecord) -> ServiceResult<FixedOffset> {
        match attorney.timezone.as_deref() {
            None => Ok(self.config.default_utc_offset),
            Some(raw) => parse_utc_offset(raw).ok_or_else(|| {
                DatabaseError::Serialization(format!(
                    "attorney {} has invalid timezone '{}'",
                    attorney.id, raw
                ))
                .into()
            }),
        }
    }

    /// Local hours on `date` held by non-cancelled consultations.
    async fn occupied_hours(
        &self,
        attorney_id: Uuid,
        date: NaiveDate,
        offset: FixedOffset,
    ) -> ServiceResult<BTreeSet<u32>> {
        let (start, end) = slots::day_bounds(date, offset);
        let booked = self
            .db
            .list_attorney_consultations_between(attorney_id, start, end)
            .await?;
        Ok(booked
            .iter()
            .filter(|c| c.status.occupies_slot())
            .map(|c| slots::local_hour(c.scheduled_at, offset))
            .collect())
    }

    pub async fn compute_available_slots(
        &self,
        attorney_id: Uuid,
        date: NaiveDate,
    ) -> ServiceResult<Vec<Slot>> {
        let attorney = self.require_attorney(attorney_id).await?;
        let offset = self.attorney_offset(&attorney)?;
        let occupied = self.occupied_hours(attorney_id, date, offset).await?;
        let open = slots::open_slots(
            date,
            offset,
            self.config.slot_start_hour,
            self.config.slot_end_hour,
            &occupied,
        );
        tracing::debug!(
            %attorney_id,
            %date,
            occupied = occupied.len(),
            open = open.len(),
            "computed available slots"
        );
        Ok(open)
    }

    pub async fn create_consultation(
        &self,
        request: BookingRequest,
    ) -> ServiceResult<BookingReceipt> {
        let client_name = request.client_name.trim();
        let client_email = request.client_email.trim();
        if client_name.is_empty() || client_email.is_empty() {
            return Err(ServiceError::validation(
                "Client name and email are required",
            ));
        }
        if request.duration_minutes <= 0 {
            return Err(ServiceError::validation("Duration must be positive"));
        }

        let attorney = self.require_attorney(request.attorney_id).await?;
        if request.scheduled_at < Utc::now() {
            return Err(ServiceError::InvalidState(
                "Cannot book consultation in the past".to_string(),
            ));
        }

        let offset = self.attorney_offset(&attorney)?;
        let local_date = request.scheduled_at.with_timezone(&offset).date_naive();
        let hour = slots::local_hour(request.scheduled_at, offset);
        if self
            .occupied_hours(attorney.id, local_date, offset)
            .await?
            .contains(&hour)
        {
            return Err(ServiceError::Conflict(SLOT_TAKEN.to_string()));
        }

        // Priced before any client or matter row is written.
        let quote = pricing::quote(
            &attorney,
            request.consultation_type,
            request.duration_minutes,
            request.package_id.as_deref(),
        )
        .ok_or_else(|| ServiceError::validation(PRICE_OUT_OF_RANGE))?;

        let client = reconcile::ensure_client(
            self.db.as_ref(),
            client_name,
            client_email,
            request.client_phone.as_deref(),
        )
        .await?;

        if quote.basis == PriceBasis::UnmatchedPackage {
            tracing::warn!(
                attorney_id = %attorney.id,
                package_id = request.package_id.as_deref().unwrap_or(""),
                "fixed-fee booking matched no package; pricing at zero"
            );
        }

        let matter = reconcile::ensure_matter(self.db.as_ref(), attorney.id, client.id).await?;

        let consultation = self
            .db
            .insert_consultation(&NewConsultationParams {
                attorney_id: attorney.id,
                client_id: client.id,
                matter_id: matter.id,
                scheduled_at: request.scheduled_at,
                duration_minutes: request.duration_minutes,
                price: quote.amount,
                consultation_type: request.consultation_type,
                package_id: request.package_id,
                notes: request.notes,
                slot_key: slots::slot_key(request.scheduled_at, offset),
            })
            .await
            .map_err(slot_conflict)?;

        tracing::info!(
            consultation_id = %consultation.id,
            attorney_id = %attorney.id,
            matter_id = %matter.id,
            slot = %consultation.slot_key,
            price = %consultation.price,
            "consultation booked"
        );

        Ok(BookingReceipt {
            success: true,
            id: consultation.id,
            message: BOOKED.to_string(),
        })
    }

    pub async fn get_consultation(&self, id: Uuid) -> ServiceResult<ConsultationRecord> {
        self.db
            .get_consultation(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Consultation"))
    }

    /// Overwrite the status; no transition rules apply here.
    pub async fn update_status(
        &self,
        id: Uuid,
        status: ConsultationStatus,
    ) -> ServiceResult<ConsultationRecord> {
        let previous = self.get_consultation(id).await?;
        let updated = self
            .db
            .set_consultation_status(id, status)
            .await
            .map_err(slot_conflict)?
            .ok_or_else(|| ServiceError::not_found("Consultation"))?;
        tracing::info!(
            consultation_id = %id,
            from = previous.status.as_str(),
            to = status.as_str(),
            "consultation status changed"
        );
        Ok(updated)
    }

    pub async fn cancel(&self, id: Uuid) -> ServiceResult<ConsultationRecord> {
        let consultation = self.get_consultation(id).await?;
        if consultation.status == ConsultationStatus::Completed {
            return Err(ServiceError::InvalidState(
                "Cannot cancel a completed consultation".to_string(),
            ));
        }
        if consultation.status == ConsultationStatus::Cancelled {
            return Ok(consultation);
        }
        self.update_status(id, ConsultationStatus::Cancelled).await
    }

    /// Pending and confirmed consultations in `[now, now + days]`, soonest first.
    pub async fn get_upcoming_consultations(
        &self,
        attorney_id: Uuid,
        days: Option<i64>,
        limit: Option<usize>,
    ) -> ServiceResult<Vec<UpcomingConsultation>> {
        let days = days.unwrap_or(self.config.upcoming_days).max(0);
        let limit = limit.unwrap_or(self.config.upcoming_limit);
        let now = Utc::now();
        let horizon = upcoming_horizon(now, days);

        let candidates = self
            .db
            .list_attorney_consultations_between(attorney_id, now, horizon)
            .await?;

        let mut names: HashMap<Uuid, String> = HashMap::new();
        let mut out = Vec::new();
        for consultation in candidates
            .into_iter()
            .filter(|c| {
                matches!(
                    c.status,
                    ConsultationStatus::Pending | ConsultationStatus::Confirmed
                )
            })
            .take(limit)
        {
            let client_name = match names.get(&consultation.client_id) {
                Some(name) => name.clone(),
                None => {
                    let name = self
                        .db
                        .get_client(consultation.client_id)
                        .await?
                        .map(|client| client.full_name)
                        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());
                    names.insert(consultation.client_id, name.clone());
                    name
                }
            };
            let end_time = consultation.scheduled_at
                + Duration::minutes(i64::from(consultation.duration_minutes));
            out.push(UpcomingConsultation {
                consultation,
                client_name,
                end_time,
            });
        }
        Ok(out)
    }

    pub async fn list_for_attorney(
        &self,
        attorney_id: Uuid,
    ) -> ServiceResult<Vec<ConsultationRecord>> {
        Ok(self.db.list_consultations_for_attorney(attorney_id).await?)
    }

    pub async fn list_for_client(&self, client_id: Uuid) -> ServiceResult<Vec<ConsultationRecord>> {
        Ok(self.db.list_consultations_for_client(client_id).await?)
    }

    pub async fn list_for_matter(&self, matter_id: Uuid) -> ServiceResult<Vec<ConsultationRecord>> {
        Ok(self.db.list_consultations_for_matter(matter_id).await?)
    }
}

/// `now + days`, capped at the last instant of year 9999 so stored
/// timestamps keep comparing as text.
fn upcoming_horizon(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    let ceiling = NaiveDate::from_ymd_opt(9999, 12, 31)
        .and_then(|date| date.and_hms_milli_opt(23, 59, 59, 999))
        .map_or(DateTime::<Utc>::MAX_UTC, |latest| latest.and_utc());
    Duration::try_days(days)
        .and_then(|span| now.checked_add_signed(span))
        .map_or(ceiling, |horizon| horizon.min(ceiling))
}

fn slot_conflict(err: DatabaseError) -> ServiceError {
    match err {
        DatabaseError::Constraint(index) if index == CONSULTATION_SLOT_INDEX => {
            ServiceError::Conflict(SLOT_TAKEN.to_string())
        }
        other => ServiceError::Database(other),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, NaiveDate, Utc};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use crate::config::BookingConfig;
    use crate::db::{
        AttorneyRecord, ConsultationStatus, ConsultationType, Database, UpdateAttorneyParams,
    };
    use crate::directory::AttorneyDirectory;
    use crate::directory::attorneys::TIMEZONE_LOCKED;
    use crate::error::{DatabaseError, ServiceError};
    use crate::testing::{attorney_params, memory_db};

    use super::{BOOKED, BookingRequest, PRICE_OUT_OF_RANGE, Scheduler, upcoming_horizon};

    fn future_date(days_ahead: i64) -> NaiveDate {
        (Utc::now() + Duration::days(days_ahead)).date_naive()
    }

    fn at(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
        date.and_hms_opt(hour, minute, 0)
            .expect("valid time")
            .and_utc()
    }

    fn request(attorney_id: Uuid, scheduled_at: DateTime<Utc>) -> BookingRequest {
        BookingRequest {
            attorney_id,
            client_name: "Riley Client".to_string(),
            client_email: "riley@example.test".to_string(),
            client_phone: None,
            scheduled_at,
            duration_minutes: 60,
            consultation_type: ConsultationType::Hourly,
            package_id: None,
            notes: None,
        }
    }

    async fn setup(timezone: Option<&str>) -> (Arc<dyn Database>, Scheduler, AttorneyRecord) {
        let db = memory_db().await;
        let mut params = attorney_params("sched@firm.test", "SCH-1");
        params.timezone = timezone.map(str::to_string);
        let attorney = db.create_attorney(&params).await.expect("attorney");
        let scheduler = Scheduler::new(Arc::clone(&db), BookingConfig::default());
        (db, scheduler, attorney)
    }

    fn hours(slots: &[super::Slot]) -> Vec<String> {
        slots.iter().map(|slot| slot.time.clone()).collect()
    }

    #[tokio::test]
    async fn empty_day_offers_eight_slots() {
        let (_db, scheduler, attorney) = setup(None).await;
        let slots = scheduler
            .compute_available_slots(attorney.id, future_date(3))
            .await
            .expect("slots");
        assert_eq!(
            hours(&slots),
            vec!["9:00", "10:00", "11:00", "12:00", "13:00", "14:00", "15:00", "16:00"]
        );
    }

    #[tokio::test]
    async fn unknown_attorney_is_not_found() {
        let (_db, scheduler, _attorney) = setup(None).await;
        let err = scheduler
            .compute_available_slots(Uuid::new_v4(), future_date(1))
            .await
            .expect_err("missing attorney");
        assert!(matches!(err, ServiceError::NotFound(ref msg) if msg == "Attorney not found"));

        let err = scheduler
            .create_consultation(request(Uuid::new_v4(), at(future_date(2), 10, 0)))
            .await
            .expect_err("missing attorney");
        assert_eq!(err.to_string(), "Attorney not found");
    }

    #[tokio::test]
    async fn booking_creates_client_matter_and_pending_consultation() {
        let (db, scheduler, attorney) = setup(None).await;
        let receipt = scheduler
            .create_consultation(request(attorney.id, at(future_date(4), 11, 0)))
            .await
            .expect("book");
        assert!(receipt.success);
        assert_eq!(receipt.message, BOOKED);

        let consultation = scheduler.get_consultation(receipt.id).await.expect("load");
        assert_eq!(consultation.status, ConsultationStatus::Pending);
        assert_eq!(consultation.price, dec!(300));
        let client = db
            .get_client(consultation.client_id)
            .await
            .expect("client")
            .expect("exists");
        assert_eq!(client.email, "riley@example.test");
        let matter = db
            .get_matter(consultation.matter_id)
            .await
            .expect("matter")
            .expect("exists");
        assert_eq!(matter.attorney_id, attorney.id);
        assert!(matter.title.is_none());
        assert!(matter.last_message_at.is_none());
    }

    #[tokio::test]
    async fn repeat_booking_reuses_client_and_matter() {
        let (db, scheduler, attorney) = setup(None).await;
        let date = future_date(5);
        let first = scheduler
            .create_consultation(request(attorney.id, at(date, 9, 0)))
            .await
            .expect("first");
        let mut second = request(attorney.id, at(date, 13, 0));
        second.client_name = "Riley C.".to_string();
        second.duration_minutes = 30;
        let second = scheduler.create_consultation(second).await.expect("second");

        let a = scheduler.get_consultation(first.id).await.expect("a");
        let b = scheduler.get_consultation(second.id).await.expect("b");
        assert_eq!(a.client_id, b.client_id);
        assert_eq!(a.matter_id, b.matter_id);
        assert_eq!(b.price, dec!(150));
        assert_eq!(
            db.list_matters_for_attorney(attorney.id)
                .await
                .expect("matters")
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn same_hour_conflicts_regardless_of_minute() {
        let (_db, scheduler, attorney) = setup(None).await;
        let date = future_date(6);
        let mut long = request(attorney.id, at(date, 10, 5));
        long.duration_minutes = 90;
        scheduler.create_consultation(long).await.expect("first");

        let err = scheduler
            .create_consultation(request(attorney.id, at(date, 10, 55)))
            .await
            .expect_err("same hour");
        assert!(
            matches!(err, ServiceError::Conflict(ref msg) if msg == "This time slot is already booked")
        );

        // A long consultation only holds its starting hour.
        scheduler
            .create_consultation(request(attorney.id, at(date, 11, 0)))
            .await
            .expect("next hour is free");
    }

    #[tokio::test]
    async fn past_booking_is_invalid_state() {
        let (_db, scheduler, attorney) = setup(None).await;
        let err = scheduler
            .create_consultation(request(attorney.id, Utc::now() - Duration::hours(1)))
            .await
            .expect_err("past");
        assert!(
            matches!(err, ServiceError::InvalidState(ref msg) if msg == "Cannot book consultation in the past")
        );
    }

    #[tokio::test]
    async fn blank_client_and_non_positive_duration_are_rejected() {
        let (_db, scheduler, attorney) = setup(None).await;
        let mut blank = request(attorney.id, at(future_date(2), 9, 0));
        blank.client_email = "   ".to_string();
        assert!(matches!(
            scheduler.create_consultation(blank).await,
            Err(ServiceError::Validation(_))
        ));

        let mut zero = request(attorney.id, at(future_date(2), 9, 0));
        zero.duration_minutes = 0;
        assert!(matches!(
            scheduler.create_consultation(zero).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn fixed_fee_pricing_uses_package_or_zero() {
        let (_db, scheduler, attorney) = setup(None).await;
        let date = future_date(7);
        let mut matched = request(attorney.id, at(date, 9, 0));
        matched.consultation_type = ConsultationType::Fixed;
        matched.package_id = Some("X".to_string());
        let matched = scheduler.create_consultation(matched).await.expect("X");

        let mut unmatched = request(attorney.id, at(date, 10, 0));
        unmatched.consultation_type = ConsultationType::Fixed;
        unmatched.package_id = Some("Y".to_string());
        let unmatched = scheduler.create_consultation(unmatched).await.expect("Y");

        assert_eq!(
            scheduler.get_consultation(matched.id).await.expect("m").price,
            dec!(1000)
        );
        assert_eq!(
            scheduler.get_consultation(unmatched.id).await.expect("u").price,
            dec!(0)
        );
    }

    #[tokio::test]
    async fn cancel_frees_the_hour_and_refuses_completed() {
        let (_db, scheduler, attorney) = setup(None).await;
        let date = future_date(8);
        let booked = scheduler
            .create_consultation(request(attorney.id, at(date, 14, 0)))
            .await
            .expect("book");
        let slots = scheduler
            .compute_available_slots(attorney.id, date)
            .await
            .expect("slots");
        assert!(!hours(&slots).contains(&"14:00".to_string()));

        let cancelled = scheduler.cancel(booked.id).await.expect("cancel");
        assert_eq!(cancelled.status, ConsultationStatus::Cancelled);
        scheduler.cancel(booked.id).await.expect("cancel is idempotent");
        let slots = scheduler
            .compute_available_slots(attorney.id, date)
            .await
            .expect("slots");
        assert!(hours(&slots).contains(&"14:00".to_string()));

        let rebooked = scheduler
            .create_consultation(request(attorney.id, at(date, 14, 0)))
            .await
            .expect("rebook");
        scheduler
            .update_status(rebooked.id, ConsultationStatus::Completed)
            .await
            .expect("complete");
        let err = scheduler.cancel(rebooked.id).await.expect_err("completed");
        assert_eq!(err.to_string(), "Cannot cancel a completed consultation");
    }

    #[tokio::test]
    async fn reviving_into_a_taken_slot_conflicts() {
        let (_db, scheduler, attorney) = setup(None).await;
        let date = future_date(9);
        let first = scheduler
            .create_consultation(request(attorney.id, at(date, 12, 0)))
            .await
            .expect("first");
        scheduler.cancel(first.id).await.expect("cancel");
        scheduler
            .create_consultation(request(attorney.id, at(date, 12, 0)))
            .await
            .expect("second takes the hour");

        let err = scheduler
            .update_status(first.id, ConsultationStatus::Pending)
            .await
            .expect_err("revive");
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn missing_consultation_is_not_found() {
        let (_db, scheduler, _attorney) = setup(None).await;
        let err = scheduler
            .update_status(Uuid::new_v4(), ConsultationStatus::Confirmed)
            .await
            .expect_err("missing");
        assert_eq!(err.to_string(), "Consultation not found");
        assert!(matches!(
            scheduler.cancel(Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn attorney_offset_moves_the_local_hour() {
        let (_db, scheduler, attorney) = setup(Some("-05:00")).await;
        let date = future_date(10);
        scheduler
            .create_consultation(request(attorney.id, at(date, 14, 0)))
            .await
            .expect("book");
        let slots = scheduler
            .compute_available_slots(attorney.id, date)
            .await
            .expect("slots");
        let labels = hours(&slots);
        assert!(!labels.contains(&"9:00".to_string()));
        assert_eq!(labels.len(), 7);
        assert_eq!(slots[0].time, "10:00");
        assert_eq!(slots[0].scheduled_at, at(date, 15, 0));
    }

    #[tokio::test]
    async fn upcoming_filters_window_status_and_limit() {
        let (_db, scheduler, attorney) = setup(None).await;
        let now = Utc::now();
        let soon = scheduler
            .create_consultation(request(attorney.id, now + Duration::days(1)))
            .await
            .expect("soon");
        let mut other = request(attorney.id, now + Duration::days(2));
        other.client_email = "other@example.test".to_string();
        other.client_name = "Other Person".to_string();
        other.duration_minutes = 45;
        let later = scheduler.create_consultation(other).await.expect("later");
        let cancelled = scheduler
            .create_consultation(request(attorney.id, now + Duration::days(3)))
            .await
            .expect("cancelled");
        scheduler.cancel(cancelled.id).await.expect("cancel");
        scheduler
            .create_consultation(request(attorney.id, now + Duration::days(45)))
            .await
            .expect("outside window");

        let upcoming = scheduler
            .get_upcoming_consultations(attorney.id, None, None)
            .await
            .expect("upcoming");
        let ids: Vec<Uuid> = upcoming.iter().map(|u| u.consultation.id).collect();
        assert_eq!(ids, vec![soon.id, later.id]);
        assert_eq!(upcoming[0].client_name, "Riley Client");
        assert_eq!(upcoming[1].client_name, "Other Person");
        assert_eq!(
            upcoming[1].end_time - upcoming[1].consultation.scheduled_at,
            Duration::minutes(45)
        );

        let capped = scheduler
            .get_upcoming_consultations(attorney.id, Some(60), Some(1))
            .await
            .expect("capped");
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].consultation.id, soon.id);

        let wide = scheduler
            .get_upcoming_consultations(attorney.id, Some(60), None)
            .await
            .expect("wide");
        assert_eq!(wide.len(), 3);
    }

    #[tokio::test]
    async fn timezone_change_waits_until_booked_hours_clear() {
        let (db, scheduler, attorney) = setup(None).await;
        let directory = AttorneyDirectory::new(Arc::clone(&db));
        let date = future_date(6);
        let booked = scheduler
            .create_consultation(request(attorney.id, at(date, 14, 0)))
            .await
            .expect("book");
        let to_eastern = || UpdateAttorneyParams {
            timezone: Some(Some("-05:00".to_string())),
            ..UpdateAttorneyParams::default()
        };

        let err = directory
            .update(attorney.id, to_eastern())
            .await
            .expect_err("offset is pinned by the booking");
        assert!(matches!(err, ServiceError::InvalidState(ref msg) if msg == TIMEZONE_LOCKED));
        let unrelated = directory
            .update(
                attorney.id,
                UpdateAttorneyParams {
                    hourly_rate: Some(dec!(320)),
                    ..UpdateAttorneyParams::default()
                },
            )
            .await
            .expect("other edits still allowed");
        assert!(unrelated.timezone.is_none());

        let slots = scheduler
            .compute_available_slots(attorney.id, date)
            .await
            .expect("slots");
        assert!(!hours(&slots).contains(&"14:00".to_string()));

        scheduler.cancel(booked.id).await.expect("cancel");
        directory
            .update(attorney.id, to_eastern())
            .await
            .expect("offset moves once nothing is booked");

        let slots = scheduler
            .compute_available_slots(attorney.id, date)
            .await
            .expect("slots");
        let local_two = slots
            .iter()
            .find(|slot| slot.time == "14:00")
            .expect("14:00 listed");
        assert_eq!(local_two.scheduled_at, at(date, 19, 0));
        scheduler
            .create_consultation(request(attorney.id, local_two.scheduled_at))
            .await
            .expect("a listed slot is bookable");
    }

    #[tokio::test]
    async fn unparsable_stored_timezone_is_a_store_error() {
        let (_db, scheduler, attorney) = setup(Some("Mars/Olympus")).await;
        let err = scheduler
            .compute_available_slots(attorney.id, future_date(2))
            .await
            .expect_err("bad offset");
        assert!(matches!(
            err,
            ServiceError::Database(DatabaseError::Serialization(_))
        ));
        let err = scheduler
            .create_consultation(request(attorney.id, at(future_date(2), 10, 0)))
            .await
            .expect_err("bad offset");
        assert!(matches!(
            err,
            ServiceError::Database(DatabaseError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn oversized_rate_is_rejected_before_any_write() {
        let db = memory_db().await;
        let mut params = attorney_params("max@firm.test", "MAX-1");
        params.hourly_rate = Decimal::MAX;
        let attorney = db.create_attorney(&params).await.expect("attorney");
        let scheduler = Scheduler::new(Arc::clone(&db), BookingConfig::default());

        let err = scheduler
            .create_consultation(request(attorney.id, at(future_date(3), 10, 0)))
            .await
            .expect_err("overflow");
        assert!(matches!(err, ServiceError::Validation(ref msg) if msg == PRICE_OUT_OF_RANGE));
        assert!(
            db.get_client_by_email("riley@example.test")
                .await
                .expect("lookup")
                .is_none()
        );

        let mut fixed = request(attorney.id, at(future_date(3), 10, 0));
        fixed.consultation_type = ConsultationType::Fixed;
        fixed.package_id = Some("X".to_string());
        scheduler
            .create_consultation(fixed)
            .await
            .expect("package price needs no multiplication");
    }

    #[tokio::test]
    async fn huge_upcoming_window_is_capped() {
        let (_db, scheduler, attorney) = setup(None).await;
        scheduler
            .create_consultation(request(attorney.id, Utc::now() + Duration::days(400)))
            .await
            .expect("book");
        for days in [1_000_000_000, i64::MAX] {
            let upcoming = scheduler
                .get_upcoming_consultations(attorney.id, Some(days), None)
                .await
                .expect("upcoming");
            assert_eq!(upcoming.len(), 1);
        }
    }

    #[test]
    fn upcoming_horizon_stops_at_year_9999() {
        let now = Utc::now();
        assert_eq!(upcoming_horizon(now, 2), now + Duration::days(2));
        let capped = upcoming_horizon(now, i64::MAX);
        assert_eq!(capped.date_naive(), NaiveDate::from_ymd_opt(9999, 12, 31).expect("date"));
        assert_eq!(upcoming_horizon(now, 1_000_000_000), capped);
    }

    #[tokio::test]
    async fn concurrent_bookings_for_one_hour_admit_exactly_one() {
        let (_db, scheduler, attorney) = setup(None).await;
        let slot = at(future_date(11), 15, 0);
        let mut other = request(attorney.id, slot);
        other.client_email = "second@example.test".to_string();

        let (a, b) = tokio::join!(
            scheduler.create_consultation(request(attorney.id, slot)),
            scheduler.create_consultation(other)
        );
        let outcomes = [a.is_ok(), b.is_ok()];
        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
        let err = a.err().or(b.err()).expect("one failure");
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[cfg(feature = "libsql")]
    #[tokio::test]
    async fn libsql_backend_rejects_second_booking_for_the_hour() {
        let (db, _tmp) = crate::testing::test_db().await;
        let attorney = db
            .create_attorney(&attorney_params("lib@firm.test", "LIB-1"))
            .await
            .expect("attorney");
        let scheduler = Scheduler::new(Arc::clone(&db), BookingConfig::default());
        let slot = at(future_date(12), 10, 0);
        scheduler
            .create_consultation(request(attorney.id, slot))
            .await
            .expect("first");
        let mut again = request(attorney.id, slot + Duration::minutes(20));
        again.client_email = "late@example.test".to_string();
        let err = scheduler
            .create_consultation(again)
            .await
            .expect_err("second");
        assert_eq!(err.to_string(), "This time slot is already booked");

        let upcoming = scheduler
            .get_upcoming_consultations(attorney.id, Some(i64::MAX), None)
            .await
            .expect("capped window compares as text");
        assert_eq!(upcoming.len(), 1);
    }
}
