//! Error types used throughout the integration core

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for CareLink
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum CareLinkError {
    /// No credentials were supplied and the gateway has no usable fallback key.
    #[error("Configuration missing: {0}")]
    ConfigMissing(String),

    /// The identity check explicitly rejected the credentials.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// The gateway or upstream could not be reached.
    #[error("Network error: {0}")]
    Network(String),

    /// A data fetch failed because the session token is no longer accepted.
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// Any other data fetch failure.
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// Local configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The response belongs to a session generation that has been superseded.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for CareLink operations
pub type Result<T> = std::result::Result<T, CareLinkError>;

impl CareLinkError {
    /// The message carried by the error, without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::ConfigMissing(message)
            | Self::AuthFailed(message)
            | Self::Network(message)
            | Self::SessionExpired(message)
            | Self::FetchFailed(message)
            | Self::Config(message)
            | Self::InvalidInput(message)
            | Self::Cancelled(message)
            | Self::Internal(message) => message,
        }
    }

    /// Map onto the five-member taxonomy surfaced to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigMissing(_) | Self::Config(_) => ErrorKind::ConfigMissing,
            Self::AuthFailed(_) => ErrorKind::AuthFailed,
            Self::Network(_) => ErrorKind::NetworkError,
            Self::SessionExpired(_) => ErrorKind::SessionExpired,
            Self::FetchFailed(_)
            | Self::InvalidInput(_)
            | Self::Cancelled(_)
            | Self::Internal(_) => ErrorKind::FetchFailed,
        }
    }

    /// Returns true when the error only means a newer session took over.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// Error taxonomy exposed to callers of the integration core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ConfigMissing,
    AuthFailed,
    NetworkError,
    SessionExpired,
    FetchFailed,
}

crate::impl_domain_status_conversions!(ErrorKind {
    ConfigMissing => "config_missing",
    AuthFailed => "auth_failed",
    NetworkError => "network_error",
    SessionExpired => "session_expired",
    FetchFailed => "fetch_failed",
});

/// What a caller should offer the user after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryAction {
    /// Start a fresh session with a new `authenticate()` call.
    RestartSession,
    /// Re-issue the failed request (`refetch()`).
    Retry,
}

impl ErrorKind {
    /// Recovery path for this kind of failure.
    pub const fn recovery(self) -> RecoveryAction {
        match self {
            Self::ConfigMissing | Self::AuthFailed | Self::SessionExpired => {
                RecoveryAction::RestartSession
            }
            Self::NetworkError | Self::FetchFailed => RecoveryAction::Retry,
        }
    }
}

/// Classified failure surfaced verbatim to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn recovery(&self) -> RecoveryAction {
        self.kind.recovery()
    }
}

impl From<CareLinkError> for ErrorRecord {
    fn from(err: CareLinkError) -> Self {
        Self::from(&err)
    }
}

impl From<&CareLinkError> for ErrorRecord {
    fn from(err: &CareLinkError) -> Self {
        Self { kind: err.kind(), message: err.message().to_string() }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
