//! Proxy Gateway adapter
//!
//! The gateway is the only HTTP endpoint the integration talks to. It
//! exposes three operations on one URL:
//!
//! - `GET` → `{apiKey}`: legacy fallback key
//! - `POST {path: "auth", email, password}` → `{userId, apiToken}`: sign-in
//! - `POST {query, variables, operationName}`: GraphQL passthrough

pub mod client;
pub mod graphql;

pub use client::GatewayClient;
pub use graphql::{GraphQLError, GraphQLResponse};
