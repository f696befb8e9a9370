//! HTTP transport primitives

pub mod client;

pub use client::{HttpClient, HttpClientBuilder};
