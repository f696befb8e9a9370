//! Appointment types
//!
//! Flat representation of an upstream appointment record. Date/time fields
//! keep the upstream string so one malformed value never invalidates the
//! record; parsing happens at the point of use.

use serde::{Deserialize, Serialize};

use crate::constants::UNKNOWN_STATUS_LABEL;

/// How the appointment takes place
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "label", rename_all = "snake_case")]
pub enum ContactType {
    Video,
    Phone,
    InPerson,
    Other(String),
}

impl ContactType {
    /// Classify the upstream `contact_type` free text ("Video Call",
    /// "Phone Call", "In Person", ...), ignoring case.
    pub fn from_raw(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
            return Self::Other(String::new());
        };

        let lower = raw.to_lowercase();
        if lower.contains("video") || lower.contains("zoom") {
            Self::Video
        } else if lower.contains("phone") {
            Self::Phone
        } else if lower.contains("person") {
            Self::InPerson
        } else {
            Self::Other(raw.to_string())
        }
    }
}

/// Normalized appointment status
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "label", rename_all = "snake_case")]
pub enum AppointmentStatus {
    Confirmed,
    Pending,
    Cancelled,
    Completed,
    /// Unrecognized upstream value, kept verbatim
    Other(String),
}

impl AppointmentStatus {
    /// Case-insensitive mapping of a raw status string.
    ///
    /// Unrecognized values pass through as their own literal label; a
    /// missing or blank status becomes `Other("unknown")`.
    pub fn from_raw(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
            return Self::Other(UNKNOWN_STATUS_LABEL.to_string());
        };

        match raw.to_lowercase().as_str() {
            "confirmed" => Self::Confirmed,
            "pending" => Self::Pending,
            "cancelled" | "canceled" => Self::Cancelled,
            "completed" => Self::Completed,
            _ => Self::Other(raw.to_string()),
        }
    }

    /// Display label: lowercase for known statuses, the literal otherwise.
    pub fn label(&self) -> &str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Pending => "pending",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
            Self::Other(label) => label,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Appointment flattened from the upstream nested shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: String,
    /// Calendar date as sent upstream (display only)
    pub date: Option<String>,
    /// ISO-8601 start with offset, unvalidated
    pub start: Option<String>,
    /// ISO-8601 end with offset, unvalidated
    pub end: Option<String>,
    pub length_minutes: Option<u32>,
    /// Structured type name → free-text label → "Appointment"
    pub type_label: String,
    pub contact_type: ContactType,
    pub provider_id: Option<String>,
    pub provider_name: Option<String>,
    pub join_url: Option<String>,
    pub dial_in_info: Option<String>,
    pub status: AppointmentStatus,
    pub can_reschedule: bool,
    pub can_cancel: bool,
}

/// Actions a caller may offer for one appointment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentActions {
    /// Video appointment with a join URL
    pub join_url: Option<String>,
    /// Phone appointment with dial-in details
    pub dial_in: Option<String>,
    pub can_reschedule: bool,
    pub can_cancel: bool,
}
