//! Session authenticator
//!
//! Resolves member credentials, or the legacy fallback key plus a
//! caller-supplied user id, into an [`AuthenticatedSession`]. Exactly one
//! gateway call per invocation; no retries.

use std::sync::Arc;

use carelink_domain::{AuthenticatedSession, CareLinkError, Credentials, Result};
use tracing::{debug, info};

use super::ports::GatewayPort;

pub struct SessionAuthenticator {
    gateway: Arc<dyn GatewayPort>,
}

impl SessionAuthenticator {
    pub fn new(gateway: Arc<dyn GatewayPort>) -> Self {
        Self { gateway }
    }

    /// Authenticate with `credentials`, or fall back to the gateway key.
    ///
    /// Credentials with a blank field are treated as absent.
    ///
    /// # Errors
    /// - `AuthFailed` when sign-in is rejected or returns an incomplete session
    /// - `ConfigMissing` when the legacy path yields no usable key
    /// - `Network` when the gateway cannot be reached
    pub async fn authenticate(
        &self,
        credentials: Option<&Credentials>,
        fallback_user_id: &str,
    ) -> Result<AuthenticatedSession> {
        match credentials.filter(|credentials| credentials.is_complete()) {
            Some(credentials) => self.sign_in(credentials).await,
            None => self.fallback(fallback_user_id).await,
        }
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthenticatedSession> {
        debug!(email = %credentials.email, "Signing in with member credentials");
        let session = self.gateway.sign_in(credentials).await?;

        if session.user_id.trim().is_empty() || session.api_token.trim().is_empty() {
            return Err(CareLinkError::AuthFailed(
                "Gateway returned an incomplete session".to_string(),
            ));
        }

        info!(user_id = %session.user_id, "Member sign-in succeeded");
        Ok(session)
    }

    async fn fallback(&self, user_id: &str) -> Result<AuthenticatedSession> {
        debug!(user_id = %user_id, "No member credentials; using gateway fallback key");
        let key = self.gateway.fetch_fallback_key().await?;

        if key.trim().is_empty() {
            return Err(CareLinkError::ConfigMissing(
                "Gateway returned no fallback API key".to_string(),
            ));
        }

        info!(user_id = %user_id, "Authenticated with fallback key");
        Ok(AuthenticatedSession::new(user_id, key))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use carelink_domain::ErrorKind;

    use super::*;

    #[derive(Default)]
    struct StubGateway {
        sign_in: Option<Result<AuthenticatedSession>>,
        fallback: Option<Result<String>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GatewayPort for StubGateway {
        async fn sign_in(&self, _credentials: &Credentials) -> Result<AuthenticatedSession> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.sign_in.clone().unwrap_or_else(|| panic!("sign_in not expected"))
        }

        async fn fetch_fallback_key(&self) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.fallback.clone().unwrap_or_else(|| panic!("fallback not expected"))
        }
    }

    fn authenticator(gateway: StubGateway) -> (SessionAuthenticator, Arc<StubGateway>) {
        let gateway = Arc::new(gateway);
        (SessionAuthenticator::new(gateway.clone()), gateway)
    }

    #[tokio::test]
    async fn complete_credentials_use_sign_in() {
        let (auth, gateway) = authenticator(StubGateway {
            sign_in: Some(Ok(AuthenticatedSession::new("u1", "tok1"))),
            ..Default::default()
        });

        let session =
            auth.authenticate(Some(&Credentials::new("a@b.com", "x")), "ignored").await.unwrap();

        assert_eq!(session, AuthenticatedSession::new("u1", "tok1"));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn absent_credentials_use_fallback_key_and_caller_user() {
        let (auth, gateway) = authenticator(StubGateway {
            fallback: Some(Ok("admin123".into())),
            ..Default::default()
        });

        let session = auth.authenticate(None, "u2").await.unwrap();

        assert_eq!(session, AuthenticatedSession::new("u2", "admin123"));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn partial_credentials_take_the_legacy_path() {
        let (auth, _) = authenticator(StubGateway {
            fallback: Some(Ok("admin123".into())),
            ..Default::default()
        });

        let session = auth.authenticate(Some(&Credentials::new("a@b.com", "")), "u3").await.unwrap();
        assert_eq!(session.user_id, "u3");
    }

    #[tokio::test]
    async fn missing_fallback_key_is_config_missing() {
        let (auth, _) = authenticator(StubGateway {
            fallback: Some(Ok("   ".into())),
            ..Default::default()
        });

        let err = auth.authenticate(None, "u2").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigMissing);
    }

    #[tokio::test]
    async fn rejection_passes_through_verbatim() {
        let (auth, _) = authenticator(StubGateway {
            sign_in: Some(Err(CareLinkError::AuthFailed("Invalid credentials".into()))),
            ..Default::default()
        });

        let err = auth.authenticate(Some(&Credentials::new("a@b.com", "x")), "").await.unwrap_err();
        assert_eq!(err, CareLinkError::AuthFailed("Invalid credentials".into()));
    }

    #[tokio::test]
    async fn incomplete_sign_in_session_is_rejected() {
        let (auth, _) = authenticator(StubGateway {
            sign_in: Some(Ok(AuthenticatedSession::new("u1", ""))),
            ..Default::default()
        });

        let err = auth.authenticate(Some(&Credentials::new("a@b.com", "x")), "").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthFailed);
    }

    #[tokio::test]
    async fn unreachable_gateway_is_network_error() {
        let (auth, gateway) = authenticator(StubGateway {
            fallback: Some(Err(CareLinkError::Network("connection refused".into()))),
            ..Default::default()
        });

        let err = auth.authenticate(None, "u2").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetworkError);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }
}
