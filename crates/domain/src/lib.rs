//! # CareLink Domain
//!
//! Domain types for the scheduling-platform integration core.
//!
//! This crate contains:
//! - Session, credential, appointment and transport types
//! - The integration error taxonomy and `Result` alias
//! - Configuration structures
//! - GraphQL operation-document classification
//!
//! ## Architecture
//! - No dependencies on other CareLink crates
//! - No I/O; pure data and parsing

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
pub use utils::operation_parser::{parse_operation, ParsedOperation};
