//! Token-keyed ownership of the live [`SessionClient`]
//!
//! The slot holds at most one client. Asking for a client with the same
//! token returns the existing one; a different token closes the old client
//! (and its channel) before the new one is handed out. Requests from an
//! older session generation are refused so a slow authentication can never
//! install its transport over a newer one.

use std::sync::Arc;

use carelink_domain::{
    AuthenticatedSession, CareLinkError, Result, SessionGeneration, TransportConfig,
};
use parking_lot::Mutex;
use tracing::{debug, info};

use super::session_client::SessionClient;
use crate::gateway::GatewayClient;

#[derive(Default)]
struct SlotState {
    client: Option<Arc<SessionClient>>,
    /// Newest generation seen by `client_for` or `close`
    generation: SessionGeneration,
}

pub struct TransportSlot {
    gateway: Arc<GatewayClient>,
    http_endpoint: String,
    channel_endpoint: String,
    state: Mutex<SlotState>,
}

impl TransportSlot {
    pub fn new(
        gateway: Arc<GatewayClient>,
        http_endpoint: impl Into<String>,
        channel_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            http_endpoint: http_endpoint.into(),
            channel_endpoint: channel_endpoint.into(),
            state: Mutex::new(SlotState::default()),
        }
    }

    /// The client for `session`, built only if the token changed.
    ///
    /// # Errors
    /// `Cancelled` when `generation` is older than one already seen.
    pub async fn client_for(
        &self,
        session: &AuthenticatedSession,
        generation: SessionGeneration,
    ) -> Result<Arc<SessionClient>> {
        let (client, replaced) = {
            let mut state = self.state.lock();
            if generation < state.generation {
                return Err(CareLinkError::Cancelled(format!(
                    "transport request from {generation} superseded by {}",
                    state.generation
                )));
            }
            state.generation = generation;

            if let Some(current) = state.client.as_ref().filter(|client| {
                !client.is_closed() && client.bearer_token() == session.api_token
            }) {
                debug!(generation = %generation, "Reusing session transport for unchanged token");
                return Ok(current.clone());
            }

            let config =
                TransportConfig::for_session(&self.http_endpoint, &self.channel_endpoint, session);
            let client = Arc::new(SessionClient::new(config, generation, self.gateway.clone()));
            let replaced = state.client.replace(client.clone());
            (client, replaced)
        };

        if let Some(old) = replaced {
            info!(
                old_generation = %old.generation(),
                new_generation = %generation,
                "Token changed; closing previous session transport"
            );
            old.close().await;
        }

        Ok(client)
    }

    /// The live client, if any.
    pub fn current(&self) -> Option<Arc<SessionClient>> {
        self.state.lock().client.clone().filter(|client| !client.is_closed())
    }

    /// Close and forget the live client; older generations are refused from now on.
    pub async fn close(&self, generation: SessionGeneration) {
        let client = {
            let mut state = self.state.lock();
            state.generation = state.generation.max(generation);
            state.client.take()
        };
        if let Some(client) = client {
            client.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::http::HttpClient;

    use super::*;

    fn slot() -> TransportSlot {
        let http = HttpClient::builder().max_attempts(1).build().unwrap();
        let gateway = Arc::new(GatewayClient::new("http://127.0.0.1:9/gateway", http));
        TransportSlot::new(gateway, "http://127.0.0.1:9/gateway", "ws://127.0.0.1:9/subscriptions")
    }

    #[tokio::test]
    async fn same_token_reuses_the_client() {
        let slot = slot();
        let session = AuthenticatedSession::new("u1", "tok1");

        let first = slot.client_for(&session, SessionGeneration(1)).await.unwrap();
        let second = slot.client_for(&session, SessionGeneration(2)).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!first.is_closed());
    }

    #[tokio::test]
    async fn token_change_closes_the_previous_client() {
        let slot = slot();
        let first = slot
            .client_for(&AuthenticatedSession::new("u1", "tok1"), SessionGeneration(1))
            .await
            .unwrap();
        let second = slot
            .client_for(&AuthenticatedSession::new("u1", "tok2"), SessionGeneration(2))
            .await
            .unwrap();

        assert!(first.is_closed());
        assert!(!second.is_closed());
        assert_eq!(second.bearer_token(), "tok2");
        assert!(Arc::ptr_eq(&slot.current().unwrap(), &second));
    }

    #[tokio::test]
    async fn stale_generation_is_refused() {
        let slot = slot();
        slot.client_for(&AuthenticatedSession::new("u1", "tok2"), SessionGeneration(3))
            .await
            .unwrap();

        let err = slot
            .client_for(&AuthenticatedSession::new("u1", "tok1"), SessionGeneration(2))
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(slot.current().unwrap().bearer_token(), "tok2");
    }

    #[tokio::test]
    async fn close_empties_the_slot() {
        let slot = slot();
        let client = slot
            .client_for(&AuthenticatedSession::new("u1", "tok1"), SessionGeneration(1))
            .await
            .unwrap();

        slot.close(SessionGeneration(2)).await;

        assert!(client.is_closed());
        assert!(slot.current().is_none());
        assert!(slot
            .client_for(&AuthenticatedSession::new("u1", "tok1"), SessionGeneration(1))
            .await
            .is_err());
    }
}
