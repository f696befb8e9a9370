//! Session authentication: gateway port, state machine and authenticator

pub mod ports;
pub mod service;
pub mod state;
