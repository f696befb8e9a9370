//! # CareLink Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for the proxy gateway and operation transport
//! - The session state machine and authenticator
//! - Appointment normalization and the eligibility/presentation engine
//!
//! ## Architecture Principles
//! - Only depends on `carelink-domain`
//! - No HTTP, WebSocket or cache code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod appointments;
pub mod clock;
pub mod session;

// Re-export specific items to avoid ambiguity
pub use appointments::eligibility::{
    available_actions, classify_fetch_error, classify_status, is_joinable, is_joinable_with,
    minutes_until_start, safe_parse_date, time_range_label,
};
pub use appointments::ports::OperationExecutor;
pub use appointments::transform::{
    appointments_from_data, normalize_appointment, normalize_appointments,
};
pub use clock::{Clock, MockClock, SystemClock};
pub use session::ports::GatewayPort;
pub use session::service::SessionAuthenticator;
pub use session::state::{SessionMachine, Transition};
