//! Domain utilities

pub mod operation_parser;
