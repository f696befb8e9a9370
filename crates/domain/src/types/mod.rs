//! Domain types and models

pub mod appointment;
pub mod session;
pub mod transport;

pub use appointment::{Appointment, AppointmentActions, AppointmentStatus, ContactType};
pub use session::{
    redact_token, AuthenticatedSession, Credentials, SessionGeneration, SessionState,
};
pub use transport::{Operation, OperationKind, Route, TransportConfig};
