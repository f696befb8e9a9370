//! Appointment retrieval with a stale-while-revalidate cache

pub mod cache;
pub mod service;

pub use cache::{AppointmentCache, AppointmentKey, CachedAppointments};
pub use service::{AppointmentQueryService, AppointmentsView, Refetch};
