//! Session and credential types

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::ErrorRecord;

/// Member credentials for the gateway sign-in operation
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: email.into(), password: password.into() }
    }

    /// Both fields carry a non-blank value.
    pub fn is_complete(&self) -> bool {
        !self.email.trim().is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Authenticated context required for all data calls
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedSession {
    pub user_id: String,
    pub api_token: String,
}

impl AuthenticatedSession {
    pub fn new(user_id: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), api_token: api_token.into() }
    }
}

impl fmt::Debug for AuthenticatedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedSession")
            .field("user_id", &self.user_id)
            .field("api_token", &redact_token(&self.api_token))
            .finish()
    }
}

/// Monotonically increasing tag for one authentication attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SessionGeneration(pub u64);

impl SessionGeneration {
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for SessionGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// Lifecycle of the single live session of an integration instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state")]
pub enum SessionState {
    #[default]
    Unauthenticated,
    Authenticating { generation: SessionGeneration },
    Authenticated(AuthenticatedSession),
    Failed(ErrorRecord),
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Authenticating { .. })
    }

    pub fn authenticated(&self) -> Option<&AuthenticatedSession> {
        match self {
            Self::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorRecord> {
        match self {
            Self::Failed(record) => Some(record),
            _ => None,
        }
    }
}

/// Short fingerprint of a token for logs (`admin123` → `ad***`).
pub fn redact_token(token: &str) -> String {
    let prefix: String = token.chars().take(2).collect();
    if prefix.is_empty() {
        "<empty>".to_string()
    } else {
        format!("{prefix}***")
    }
}
