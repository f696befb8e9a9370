//! Appointment normalization and eligibility rules

pub mod eligibility;
pub mod ports;
pub mod transform;
