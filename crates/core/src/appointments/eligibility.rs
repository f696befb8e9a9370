//! Eligibility & presentation rules
//!
//! Everything here is total: unparseable dates degrade to `None` or a
//! placeholder label, never to an error.

use carelink_domain::constants::{JOIN_WINDOW_MINUTES, TIME_PLACEHOLDER};
use carelink_domain::{
    Appointment, AppointmentActions, AppointmentStatus, CareLinkError, ContactType, ErrorKind,
    ErrorRecord,
};
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

use crate::clock::Clock;

/// Fallback layouts accepted after RFC 3339.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S %z", "%Y-%m-%d %H:%M:%S%.f%:z"];
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

/// Parse an upstream datetime, keeping its offset.
///
/// Values without an offset are read as UTC.
fn parse_with_offset(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed);
    }

    OFFSET_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
                .map(|naive| naive.and_utc().fixed_offset())
        })
}

/// Parse an upstream datetime; missing or invalid input yields `None`.
pub fn safe_parse_date(value: Option<&str>) -> Option<DateTime<Utc>> {
    value.and_then(parse_with_offset).map(|parsed| parsed.with_timezone(&Utc))
}

/// Whole minutes from `now` until the start (negative once started).
pub fn minutes_until_start(appointment: &Appointment, now: DateTime<Utc>) -> Option<i64> {
    safe_parse_date(appointment.start.as_deref()).map(|start| (start - now).num_minutes())
}

/// Join window: opens 15 minutes before start, closes at end.
///
/// Requires both `start` and `end` to parse. In-progress appointments are
/// joinable.
pub fn is_joinable(appointment: &Appointment, now: DateTime<Utc>) -> bool {
    let (Some(start), Some(end)) = (
        safe_parse_date(appointment.start.as_deref()),
        safe_parse_date(appointment.end.as_deref()),
    ) else {
        return false;
    };

    (start - now).num_minutes() <= JOIN_WINDOW_MINUTES && now < end
}

/// [`is_joinable`] against a [`Clock`].
pub fn is_joinable_with(appointment: &Appointment, clock: &dyn Clock) -> bool {
    is_joinable(appointment, clock.now())
}

pub fn classify_status(raw: Option<&str>) -> AppointmentStatus {
    AppointmentStatus::from_raw(raw)
}

/// Actions the caller may offer.
///
/// Join needs a video appointment with a join URL; dial-in needs a phone
/// appointment with dial-in details. Reschedule/cancel mirror the server
/// capability flags.
pub fn available_actions(appointment: &Appointment) -> AppointmentActions {
    let join_url = match appointment.contact_type {
        ContactType::Video => appointment.join_url.clone(),
        _ => None,
    };
    let dial_in = match appointment.contact_type {
        ContactType::Phone => appointment.dial_in_info.clone(),
        _ => None,
    };

    AppointmentActions {
        join_url,
        dial_in,
        can_reschedule: appointment.can_reschedule,
        can_cancel: appointment.can_cancel,
    }
}

/// Classify a failed data fetch.
///
/// A `SessionExpired` error (already classified from a structured code or
/// HTTP status) passes through. Otherwise a message mentioning "invalid" or
/// "api key" in any case means the token was refused; everything else is a
/// retryable `FetchFailed`.
pub fn classify_fetch_error(error: &CareLinkError) -> ErrorRecord {
    let message = error.message();
    if matches!(error, CareLinkError::SessionExpired(_)) || looks_like_rejected_token(message) {
        return ErrorRecord::new(ErrorKind::SessionExpired, message);
    }
    ErrorRecord::new(ErrorKind::FetchFailed, message)
}

fn looks_like_rejected_token(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("invalid") || lower.contains("api key")
}

/// `"HH:MM – HH:MM"` in the upstream offset, or the placeholder.
pub fn time_range_label(appointment: &Appointment) -> String {
    let start = appointment.start.as_deref().and_then(parse_with_offset);
    let end = appointment.end.as_deref().and_then(parse_with_offset);

    match (start, end) {
        (Some(start), Some(end)) => {
            format!("{} – {}", start.format("%H:%M"), end.format("%H:%M"))
        }
        _ => TIME_PLACEHOLDER.to_string(),
    }
}
