//! Dual-channel client owned by one authenticated session

use std::sync::Arc;

use async_trait::async_trait;
use carelink_core::OperationExecutor;
use carelink_domain::{
    redact_token, CareLinkError, Operation, Result, Route, SessionGeneration, TransportConfig,
};
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::channel::{Channel, SubscriptionStream};
use crate::gateway::GatewayClient;

/// Result of routing one operation
#[derive(Debug)]
pub enum Dispatched {
    Response(Value),
    Subscription(SubscriptionStream),
}

/// Session-scoped transport
///
/// Queries and mutations go over HTTP through the gateway with the token in
/// the `Authorization` header. Subscriptions share one lazily-opened
/// persistent channel with the token in the connection URI. The client is
/// owned explicitly: [`SessionClient::close`] cancels in-flight requests and
/// closes the channel; dropping it aborts the channel task.
pub struct SessionClient {
    config: TransportConfig,
    generation: SessionGeneration,
    gateway: Arc<GatewayClient>,
    channel: AsyncMutex<Option<Arc<Channel>>>,
    cancel: CancellationToken,
}

impl SessionClient {
    pub fn new(
        config: TransportConfig,
        generation: SessionGeneration,
        gateway: Arc<GatewayClient>,
    ) -> Self {
        debug!(
            generation = %generation,
            token = %redact_token(config.bearer_token()),
            "Session transport built"
        );
        Self {
            config,
            generation,
            gateway,
            channel: AsyncMutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn bearer_token(&self) -> &str {
        self.config.bearer_token()
    }

    /// Generation of the session that built this client.
    pub fn generation(&self) -> SessionGeneration {
        self.generation
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Route by the operation's stored kind.
    pub async fn dispatch(&self, operation: Operation) -> Result<Dispatched> {
        match operation.route() {
            Route::Http => self.execute(operation).await.map(Dispatched::Response),
            Route::Channel => self.subscribe(operation).await.map(Dispatched::Subscription),
        }
    }

    /// Run a query or mutation over HTTP.
    ///
    /// # Errors
    /// `InvalidInput` for subscriptions, `Cancelled` once the client is
    /// closed, otherwise the classified gateway error.
    pub async fn execute(&self, operation: Operation) -> Result<Value> {
        if operation.route() != Route::Http {
            return Err(CareLinkError::InvalidInput(
                "subscriptions must be dispatched over the persistent channel".into(),
            ));
        }
        self.ensure_open()?;

        tokio::select! {
            _ = self.cancel.cancelled() => Err(self.cancelled()),
            result = self.gateway.graphql(&operation, Some(self.config.bearer_token())) => result,
        }
    }

    /// Start a subscription on the persistent channel, opening it if needed.
    pub async fn subscribe(&self, operation: Operation) -> Result<SubscriptionStream> {
        if operation.route() != Route::Channel {
            return Err(CareLinkError::InvalidInput(format!(
                "{} operations are dispatched over HTTP",
                operation.kind()
            )));
        }
        self.ensure_open()?;

        let mut slot = self.channel.lock().await;
        if let Some(channel) = slot.as_ref().filter(|channel| channel.is_open()) {
            return channel.subscribe(&operation);
        }

        let channel = tokio::select! {
            _ = self.cancel.cancelled() => return Err(self.cancelled()),
            channel = Channel::connect(self.config.channel_endpoint(), self.config.bearer_token()) => {
                Arc::new(channel?)
            }
        };
        let stream = channel.subscribe(&operation)?;
        *slot = Some(channel);
        Ok(stream)
    }

    /// A persistent channel is currently connected.
    pub async fn has_open_channel(&self) -> bool {
        self.channel.lock().await.as_ref().is_some_and(|channel| channel.is_open())
    }

    /// Cancel in-flight requests and close the persistent channel.
    pub async fn close(&self) {
        self.cancel.cancel();
        let channel = self.channel.lock().await.take();
        if let Some(channel) = channel {
            channel.close().await;
        }
        info!(generation = %self.generation, "Session transport closed");
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(self.cancelled());
        }
        Ok(())
    }

    fn cancelled(&self) -> CareLinkError {
        CareLinkError::Cancelled(format!("session transport {} closed", self.generation))
    }
}

impl std::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("config", &self.config)
            .field("generation", &self.generation)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Drop for SessionClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl OperationExecutor for SessionClient {
    async fn execute(&self, operation: Operation) -> Result<Value> {
        SessionClient::execute(self, operation).await
    }
}
