//! Proxy gateway port

use async_trait::async_trait;
use carelink_domain::{AuthenticatedSession, Credentials, Result};

/// Trait for the proxy gateway's identity operations
///
/// Each method performs exactly one outbound call and holds no resources
/// once it returns.
#[async_trait]
pub trait GatewayPort: Send + Sync {
    /// Exchange member credentials for a per-user session.
    ///
    /// Rejections surface as `CareLinkError::AuthFailed` carrying the
    /// gateway's message; an unreachable gateway as `CareLinkError::Network`.
    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthenticatedSession>;

    /// Fetch the platform-held fallback key (legacy path).
    ///
    /// A non-2xx answer or a body without a key surfaces as
    /// `CareLinkError::ConfigMissing`.
    async fn fetch_fallback_key(&self) -> Result<String>;
}
