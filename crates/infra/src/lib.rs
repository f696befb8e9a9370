//! # CareLink Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - The Proxy Gateway client (sign-in, fallback key, GraphQL passthrough)
//! - The token-keyed transport router (HTTP + persistent channel)
//! - Appointment retrieval with a stale-while-revalidate cache
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Implements traits defined in `carelink-core`
//! - Contains all "impure" code (network I/O, caching, env/file access)
//! - [`SchedulingIntegration`] wires everything for one mounted integration

pub mod appointments;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod http;
pub mod integration;
pub mod observability;
pub mod transport;

// Re-export commonly used items
pub use appointments::service::{APPOINTMENTS_QUERY, CANCEL_APPOINTMENT_MUTATION};
pub use appointments::{AppointmentCache, AppointmentKey, AppointmentQueryService, AppointmentsView};
pub use errors::InfraError;
pub use gateway::GatewayClient;
pub use http::{HttpClient, HttpClientBuilder};
pub use integration::{SchedulingIntegration, APPOINTMENT_UPDATES_SUBSCRIPTION};
pub use observability::init_tracing;
pub use transport::{Dispatched, SessionClient, SubscriptionStream, TransportSlot};
