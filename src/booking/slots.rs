//! Attorney-local calendar math for one-hour booking slots.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use serde::Serialize;

/// One bookable hour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    /// Unpadded local label such as `9:00` or `14:00`.
    pub time: String,
    pub scheduled_at: DateTime<Utc>,
}

/// UTC bounds of `date` in `offset`, from local midnight to 23:59:59.999.
pub fn day_bounds(date: NaiveDate, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    // Fixed offsets have no gaps or folds, so the local mapping is unique.
    let start = offset
        .from_local_datetime(&date.and_time(NaiveTime::MIN))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| date.and_time(NaiveTime::MIN).and_utc());
    let end = start + Duration::days(1) - Duration::milliseconds(1);
    (start, end)
}

/// Attorney-local `YYYY-MM-DDTHH` that a consultation at `at` occupies.
pub fn slot_key(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset).format("%Y-%m-%dT%H").to_string()
}

pub fn local_hour(at: DateTime<Utc>, offset: FixedOffset) -> u32 {
    at.with_timezone(&offset).hour()
}

pub fn hour_label(hour: u32) -> String {
    format!("{hour}:00")
}

/// Candidate hours in `start_hour..=end_hour` not present in `occupied`.
pub fn open_slots(
    date: NaiveDate,
    offset: FixedOffset,
    start_hour: u32,
    end_hour: u32,
    occupied: &BTreeSet<u32>,
) -> Vec<Slot> {
    let (day_start, _) = day_bounds(date, offset);
    (start_hour..=end_hour.min(23))
        .filter(|hour| !occupied.contains(hour))
        .map(|hour| Slot {
            time: hour_label(hour),
            scheduled_at: day_start + Duration::hours(i64::from(hour)),
        })
        .collect()
}
