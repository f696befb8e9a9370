//! Domain constants
//!
//! Centralized location for constants shared by the integration layers.

// Eligibility
pub const JOIN_WINDOW_MINUTES: i64 = 15;

// Appointment presentation
pub const DEFAULT_APPOINTMENT_TYPE_LABEL: &str = "Appointment";
pub const TIME_PLACEHOLDER: &str = "Time unavailable";
pub const UNKNOWN_STATUS_LABEL: &str = "unknown";

// Proxy gateway wire contract
pub const GATEWAY_AUTH_PATH: &str = "auth";
pub const GATEWAY_TOKEN_HEADER: &str = "Authorization";

// Persistent channel
pub const CHANNEL_PATH: &str = "/subscriptions";
pub const CHANNEL_TOKEN_PARAM: &str = "token";
pub const CHANNEL_SUBPROTOCOL: &str = "graphql-transport-ws";
