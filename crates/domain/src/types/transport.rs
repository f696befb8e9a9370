//! Operation and transport types
//!
//! Every outgoing GraphQL operation is classified exactly once, when the
//! `Operation` value is constructed. Dispatch only ever reads the stored
//! `OperationKind`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::{CareLinkError, Result};
use crate::types::session::{redact_token, AuthenticatedSession};
use crate::utils::operation_parser::parse_operation;

/// Kind of a GraphQL operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

crate::impl_domain_status_conversions!(OperationKind {
    Query => "query",
    Mutation => "mutation",
    Subscription => "subscription",
});

/// Wire channel an operation travels over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Route {
    /// Stateless HTTP transport, token carried as a per-request header
    Http,
    /// Persistent channel, token carried in the connection URI
    Channel,
}

impl OperationKind {
    /// Total routing rule: subscriptions use the channel, everything else HTTP.
    pub const fn route(self) -> Route {
        match self {
            Self::Subscription => Route::Channel,
            Self::Query | Self::Mutation => Route::Http,
        }
    }
}

/// A classified GraphQL operation ready for dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    kind: OperationKind,
    name: Option<String>,
    document: String,
    variables: Value,
}

impl Operation {
    /// Classify `document` from its first executable definition.
    ///
    /// # Errors
    /// Returns `CareLinkError::InvalidInput` when the document contains no
    /// query, mutation or subscription.
    pub fn parse(document: impl Into<String>, variables: Value) -> Result<Self> {
        let document = document.into();
        let parsed = parse_operation(&document).ok_or_else(|| {
            CareLinkError::InvalidInput("GraphQL document has no executable operation".into())
        })?;

        Ok(Self { kind: parsed.kind, name: parsed.name, document, variables })
    }

    pub fn query(name: impl Into<String>, document: impl Into<String>, variables: Value) -> Self {
        Self::typed(OperationKind::Query, name, document, variables)
    }

    pub fn mutation(
        name: impl Into<String>,
        document: impl Into<String>,
        variables: Value,
    ) -> Self {
        Self::typed(OperationKind::Mutation, name, document, variables)
    }

    pub fn subscription(
        name: impl Into<String>,
        document: impl Into<String>,
        variables: Value,
    ) -> Self {
        Self::typed(OperationKind::Subscription, name, document, variables)
    }

    fn typed(
        kind: OperationKind,
        name: impl Into<String>,
        document: impl Into<String>,
        variables: Value,
    ) -> Self {
        let name = name.into();
        Self {
            kind,
            name: if name.is_empty() { None } else { Some(name) },
            document: document.into(),
            variables,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn route(&self) -> Route {
        self.kind.route()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn variables(&self) -> &Value {
        &self.variables
    }

    /// `{query, variables, operationName}` request body.
    pub fn to_payload(&self) -> Value {
        let mut payload = json!({
            "query": self.document,
            "variables": self.variables,
        });
        if let Some(name) = &self.name {
            payload["operationName"] = Value::String(name.clone());
        }
        payload
    }
}

/// Endpoints and bearer token of one authenticated session
///
/// Only constructible from an [`AuthenticatedSession`], so a transport can
/// never exist before authentication has succeeded.
#[derive(Clone, PartialEq, Eq)]
pub struct TransportConfig {
    http_endpoint: String,
    channel_endpoint: String,
    bearer_token: String,
}

impl TransportConfig {
    pub fn for_session(
        http_endpoint: impl Into<String>,
        channel_endpoint: impl Into<String>,
        session: &AuthenticatedSession,
    ) -> Self {
        Self {
            http_endpoint: http_endpoint.into(),
            channel_endpoint: channel_endpoint.into(),
            bearer_token: session.api_token.clone(),
        }
    }

    pub fn http_endpoint(&self) -> &str {
        &self.http_endpoint
    }

    pub fn channel_endpoint(&self) -> &str {
        &self.channel_endpoint
    }

    pub fn bearer_token(&self) -> &str {
        &self.bearer_token
    }
}

impl std::fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConfig")
            .field("http_endpoint", &self.http_endpoint)
            .field("channel_endpoint", &self.channel_endpoint)
            .field("bearer_token", &redact_token(&self.bearer_token))
            .finish()
    }
}
