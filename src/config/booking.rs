use chrono::{FixedOffset, Offset, Utc};

use crate::config::helpers::{parse_env, parse_string_env};
use crate::error::ConfigError;
use crate::settings::Settings;

/// Scheduling window and upcoming-list defaults.
#[derive(Debug, Clone)]
pub struct BookingConfig {
    /// Offset used for attorneys that have not declared one.
    pub default_utc_offset: FixedOffset,
    /// First bookable local hour, inclusive.
    pub slot_start_hour: u32,
    /// Last bookable local hour, inclusive.
    pub slot_end_hour: u32,
    pub upcoming_days: i64,
    pub upcoming_limit: usize,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            default_utc_offset: Utc.fix(),
            slot_start_hour: 9,
            slot_end_hour: 16,
            upcoming_days: 30,
            upcoming_limit: 10,
        }
    }
}

/// Parse `+HH:MM`, `-HH:MM`, `Z`, or `UTC` into a fixed offset.
pub fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return Some(Utc.fix());
    }
    trimmed.parse::<FixedOffset>().ok()
}

fn validate_hours(start: u32, end: u32) -> Result<(), ConfigError> {
    for (key, hour) in [
        ("BOOKING_SLOT_START_HOUR", start),
        ("BOOKING_SLOT_END_HOUR", end),
    ] {
        if hour > 23 {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("hour {hour} is outside 0-23"),
            });
        }
    }
    if start > end {
        return Err(ConfigError::InvalidValue {
            key: "BOOKING_SLOT_START_HOUR".to_string(),
            message: format!("start hour {start} is after end hour {end}"),
        });
    }
    Ok(())
}

impl BookingConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let offset_raw = parse_string_env(
            "BOOKING_DEFAULT_UTC_OFFSET",
            settings.booking.default_utc_offset.clone(),
        )?;
        let default_utc_offset =
            parse_utc_offset(&offset_raw).ok_or_else(|| ConfigError::InvalidValue {
                key: "BOOKING_DEFAULT_UTC_OFFSET".to_string(),
                message: format!("'{offset_raw}' is not a UTC offset like +02:00"),
            })?;

        let slot_start_hour =
            parse_env("BOOKING_SLOT_START_HOUR", settings.booking.slot_start_hour)?;
        let slot_end_hour = parse_env("BOOKING_SLOT_END_HOUR", settings.booking.slot_end_hour)?;
        validate_hours(slot_start_hour, slot_end_hour)?;

        let upcoming_days = parse_env("BOOKING_UPCOMING_DAYS", settings.booking.upcoming_days)?;
        if upcoming_days < 0 {
            return Err(ConfigError::InvalidValue {
                key: "BOOKING_UPCOMING_DAYS".to_string(),
                message: "must not be negative".to_string(),
            });
        }

        Ok(Self {
            default_utc_offset,
            slot_start_hour,
            slot_end_hour,
            upcoming_days,
            upcoming_limit: parse_env("BOOKING_UPCOMING_LIMIT", settings.booking.upcoming_limit)?,
        })
    }
}
