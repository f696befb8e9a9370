//! Upstream appointment record normalization
//!
//! Records arrive as loosely-typed JSON with nested `appointment_type` and
//! `provider` objects. Normalization flattens them, resolving the type label
//! through `appointment_type.name` → `appointment_label` → `"Appointment"`.
//! Missing or oddly-typed optional fields degrade to `None`/`false`; a record
//! is only skipped when it is not an object or has no id.

use std::cmp::Ordering;

use carelink_domain::constants::DEFAULT_APPOINTMENT_TYPE_LABEL;
use carelink_domain::{Appointment, AppointmentStatus, ContactType};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use super::eligibility::safe_parse_date;

/// Appointment records inside a GraphQL `data` object (`data.appointments`).
pub fn appointments_from_data(data: &Value) -> &[Value] {
    data.get("appointments").and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default()
}

/// Flatten one upstream record.
pub fn normalize_appointment(record: &Value) -> Option<Appointment> {
    let Some(fields) = record.as_object() else {
        warn!(record_type = json_type(record), "Skipping non-object appointment record");
        return None;
    };

    let Some(id) = fields.get("id").and_then(scalar_text) else {
        warn!("Skipping appointment record without id");
        return None;
    };

    let provider = fields.get("provider");
    let type_label = fields
        .get("appointment_type")
        .and_then(|kind| kind.get("name"))
        .and_then(scalar_text)
        .or_else(|| fields.get("appointment_label").and_then(scalar_text))
        .unwrap_or_else(|| DEFAULT_APPOINTMENT_TYPE_LABEL.to_string());

    Some(Appointment {
        id,
        date: text(record, "date"),
        start: text(record, "start"),
        end: text(record, "end"),
        length_minutes: fields.get("length").and_then(minutes),
        type_label,
        contact_type: ContactType::from_raw(text(record, "contact_type").as_deref()),
        provider_id: provider.and_then(|p| p.get("id")).and_then(scalar_text),
        provider_name: provider
            .and_then(|p| p.get("name").or_else(|| p.get("full_name")))
            .and_then(scalar_text),
        join_url: text(record, "zoom_join_url").or_else(|| text(record, "external_videochat_url")),
        dial_in_info: text(record, "zoom_dial_in_info"),
        status: AppointmentStatus::from_raw(text(record, "pm_status").as_deref()),
        can_reschedule: flag(record, "can_client_reschedule"),
        can_cancel: flag(record, "can_client_cancel"),
    })
}

/// Normalize a record list and order it.
///
/// Upcoming lists sort by ascending start, past lists by descending start;
/// records whose start does not parse go last.
pub fn normalize_appointments(records: &[Value], upcoming: bool) -> Vec<Appointment> {
    let mut items: Vec<(Option<DateTime<Utc>>, Appointment)> = records
        .iter()
        .filter_map(normalize_appointment)
        .map(|appointment| (safe_parse_date(appointment.start.as_deref()), appointment))
        .collect();

    items.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) if upcoming => a.cmp(b),
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    items.into_iter().map(|(_, appointment)| appointment).collect()
}

fn text(record: &Value, key: &str) -> Option<String> {
    record.get(key).and_then(scalar_text)
}

/// Non-blank string, or a number rendered as text.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn minutes(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|m| u32::try_from(m).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn flag(record: &Value, key: &str) -> bool {
    match record.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
