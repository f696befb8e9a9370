//! HTTP client for the Proxy Gateway

use async_trait::async_trait;
use carelink_core::GatewayPort;
use carelink_domain::constants::{GATEWAY_AUTH_PATH, GATEWAY_TOKEN_HEADER};
use carelink_domain::{
    AuthenticatedSession, CareLinkError, Credentials, IntegrationConfig, Operation,
    OperationKind, Result,
};
use reqwest::{Method, Response, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::graphql::GraphQLResponse;
use crate::http::HttpClient;

pub struct GatewayClient {
    endpoint: String,
    /// Retrying client for GraphQL queries
    http: HttpClient,
    /// Single-attempt client for identity calls and mutations
    identity_http: HttpClient,
}

/// Status and body of a gateway response, parsed leniently.
struct GatewayReply {
    status: StatusCode,
    body: Value,
    raw: String,
}

impl GatewayReply {
    /// A body cut off mid-read is a `Network` error, never an empty reply.
    async fn read(response: Response) -> Result<Self> {
        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|err| CareLinkError::Network(format!("Gateway response body unreadable: {err}")))?;
        let body = serde_json::from_str(&raw).unwrap_or(Value::Null);
        Ok(Self { status, body, raw })
    }

    /// The gateway's `{error}` text, falling back to a plain-text body.
    fn error_message(&self) -> Option<String> {
        if let Some(message) = self.body.get("error").and_then(Value::as_str) {
            return Some(message.to_string());
        }
        let raw = self.raw.trim();
        (!raw.is_empty() && self.body.is_null()).then(|| raw.to_string())
    }

    fn status_label(&self) -> String {
        format!("HTTP {}", self.status.as_u16())
    }
}

impl GatewayClient {
    pub fn new(endpoint: impl Into<String>, http: HttpClient) -> Self {
        let identity_http = http.single_attempt();
        Self { endpoint: endpoint.into(), http, identity_http }
    }

    pub fn from_config(config: &IntegrationConfig) -> Result<Self> {
        Ok(Self::new(config.gateway_url.trim(), HttpClient::from_config(&config.http)?))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Forward a GraphQL operation and return its `data` object.
    ///
    /// The token travels as `Authorization: Bearer <token>`; with no token
    /// the header is omitted and the gateway applies its own fallback key.
    /// Mutations are sent once; only queries are retried on 5xx or timeout.
    ///
    /// # Errors
    /// - `SessionExpired` on HTTP 401/403 or a session error code
    /// - `FetchFailed` on other GraphQL errors or non-2xx answers
    /// - `Network` when the gateway cannot be reached
    pub async fn graphql(&self, operation: &Operation, bearer_token: Option<&str>) -> Result<Value> {
        let http = match operation.kind() {
            OperationKind::Mutation => &self.identity_http,
            _ => &self.http,
        };
        let mut request = http.request(Method::POST, &self.endpoint).json(&operation.to_payload());
        if let Some(token) = bearer_token.filter(|token| !token.is_empty()) {
            request = request.header(GATEWAY_TOKEN_HEADER, format!("Bearer {token}"));
        }

        let reply = GatewayReply::read(http.send(request).await?).await?;
        debug!(
            status = reply.status.as_u16(),
            operation = operation.name().unwrap_or("<anonymous>"),
            "Received GraphQL passthrough response"
        );

        if matches!(reply.status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            let message = reply.error_message().unwrap_or_else(|| reply.status_label());
            return Err(CareLinkError::SessionExpired(message));
        }

        let envelope: Option<GraphQLResponse<Value>> = serde_json::from_value(reply.body.clone()).ok();

        if !reply.status.is_success() {
            if let Some(Err(err)) = envelope.map(GraphQLResponse::into_data) {
                return Err(err);
            }
            let detail = reply.error_message().unwrap_or_else(|| "no details".to_string());
            return Err(CareLinkError::FetchFailed(format!(
                "Gateway error ({}): {detail}",
                reply.status_label()
            )));
        }

        envelope
            .ok_or_else(|| CareLinkError::FetchFailed("Gateway returned a non-GraphQL body".into()))?
            .into_data()
    }
}

#[async_trait]
impl GatewayPort for GatewayClient {
    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthenticatedSession> {
        let body = json!({
            "path": GATEWAY_AUTH_PATH,
            "email": credentials.email,
            "password": credentials.password,
        });
        let request = self.identity_http.request(Method::POST, &self.endpoint).json(&body);
        let reply = GatewayReply::read(self.identity_http.send(request).await?).await?;

        if !reply.status.is_success() {
            let message = reply.error_message().unwrap_or_else(|| reply.status_label());
            warn!(status = reply.status.as_u16(), error = %message, "Gateway rejected sign-in");
            return Err(CareLinkError::AuthFailed(message));
        }

        if let Some(message) = reply.body.get("error").and_then(Value::as_str) {
            return Err(CareLinkError::AuthFailed(message.to_string()));
        }

        serde_json::from_value(reply.body)
            .map_err(|e| CareLinkError::AuthFailed(format!("Malformed sign-in response: {e}")))
    }

    async fn fetch_fallback_key(&self) -> Result<String> {
        let request = self.identity_http.request(Method::GET, &self.endpoint);
        let reply = GatewayReply::read(self.identity_http.send(request).await?).await?;

        if !reply.status.is_success() {
            let detail = reply.error_message().unwrap_or_else(|| reply.status_label());
            warn!(status = reply.status.as_u16(), "Gateway has no fallback key configured");
            return Err(CareLinkError::ConfigMissing(format!(
                "Gateway fallback key unavailable: {detail}"
            )));
        }

        reply
            .body
            .get("apiKey")
            .and_then(Value::as_str)
            .filter(|key| !key.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| CareLinkError::ConfigMissing("Gateway returned no fallback API key".into()))
    }
}
