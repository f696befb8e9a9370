//! Scheduling-platform integration facade
//!
//! One instance per mounted integration. It owns the session state machine,
//! the token-keyed transport and the appointment service built on it, and
//! tears all of them down together.

use std::sync::Arc;

use carelink_core::{GatewayPort, SessionAuthenticator, SessionMachine, Transition};
use carelink_domain::{
    Appointment, CareLinkError, Credentials, IntegrationConfig, Operation, Result, SessionGeneration,
    SessionState,
};
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::appointments::{AppointmentQueryService, AppointmentsView};
use crate::gateway::GatewayClient;
use crate::transport::{Dispatched, SessionClient, SubscriptionStream, TransportSlot};

pub const APPOINTMENT_UPDATES_SUBSCRIPTION: &str = r#"
subscription AppointmentUpdated($user_id: ID) {
  appointmentUpdated(user_id: $user_id) { id pm_status }
}
"#;

/// Transport and services of the current authenticated session
struct Live {
    client: Arc<SessionClient>,
    appointments: AppointmentQueryService,
}

pub struct SchedulingIntegration {
    config: IntegrationConfig,
    authenticator: SessionAuthenticator,
    machine: Mutex<SessionMachine>,
    /// Cancels the authentication attempt in progress
    attempt: Mutex<CancellationToken>,
    transports: TransportSlot,
    live: Mutex<Option<Live>>,
}

impl SchedulingIntegration {
    /// Validate `config` and build an integration talking to its gateway.
    pub fn new(config: IntegrationConfig) -> Result<Self> {
        config.validate()?;
        let gateway = Arc::new(GatewayClient::from_config(&config)?);
        Self::with_gateway(config, gateway.clone(), gateway)
    }

    /// Build with an explicit identity port (sign-in and fallback key).
    ///
    /// `config` is validated here too.
    pub fn with_gateway(
        config: IntegrationConfig,
        gateway: Arc<GatewayClient>,
        identity: Arc<dyn GatewayPort>,
    ) -> Result<Self> {
        config.validate()?;
        let channel_endpoint = config.resolved_channel_url()?;
        let transports = TransportSlot::new(gateway, config.gateway_url.trim(), channel_endpoint);

        Ok(Self {
            authenticator: SessionAuthenticator::new(identity),
            machine: Mutex::new(SessionMachine::new()),
            attempt: Mutex::new(CancellationToken::new()),
            transports,
            live: Mutex::new(None),
            config,
        })
    }

    pub fn config(&self) -> &IntegrationConfig {
        &self.config
    }

    pub fn session(&self) -> SessionState {
        self.machine.lock().state().clone()
    }

    pub fn generation(&self) -> SessionGeneration {
        self.machine.lock().generation()
    }

    /// Start a new session.
    ///
    /// Any attempt still in flight is cancelled and its result discarded.
    /// On success the transport for the session token is built (or reused
    /// when the token is unchanged); on failure the previous transport is
    /// closed. Failures are terminal: call `authenticate` again to recover.
    pub async fn authenticate(
        &self,
        credentials: Option<&Credentials>,
        fallback_user_id: &str,
    ) -> SessionState {
        let (generation, cancel) = {
            let generation = self.machine.lock().begin();
            let cancel = CancellationToken::new();
            let previous = std::mem::replace(&mut *self.attempt.lock(), cancel.clone());
            previous.cancel();
            (generation, cancel)
        };

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(CareLinkError::Cancelled(format!(
                "authentication {generation} superseded"
            ))),
            outcome = self.authenticator.authenticate(credentials, fallback_user_id) => outcome,
        };

        match outcome {
            Ok(session) => match self.transports.client_for(&session, generation).await {
                Ok(client) => {
                    let mut machine = self.machine.lock();
                    if machine.complete(generation, Ok(session)) == Transition::Applied {
                        self.install(client);
                    }
                }
                Err(err) => {
                    self.machine.lock().complete(generation, Err(err));
                }
            },
            Err(err) => {
                let applied = self.machine.lock().complete(generation, Err(err));
                if applied == Transition::Applied {
                    self.release(generation).await;
                }
            }
        }

        self.session()
    }

    /// The live session transport, if the session is authenticated.
    pub fn session_client(&self) -> Option<Arc<SessionClient>> {
        self.live_parts().ok().map(|(client, _)| client)
    }

    /// Snapshot of the user's appointments plus a background revalidation.
    ///
    /// # Errors
    /// `SessionExpired` when no session is authenticated.
    pub fn appointments(&self, user_id: &str, upcoming: bool) -> Result<AppointmentsView> {
        let (_, appointments) = self.live_parts()?;
        Ok(appointments.get_appointments(user_id, upcoming))
    }

    /// Fetch the user's appointments now.
    pub async fn refetch_appointments(
        &self,
        user_id: &str,
        upcoming: bool,
    ) -> Result<AppointmentsView> {
        let (_, appointments) = self.live_parts()?;
        Ok(appointments.refetch(user_id, upcoming).await)
    }

    pub async fn cancel_appointment(&self, appointment: &Appointment) -> Result<()> {
        let (_, appointments) = self.live_parts()?;
        appointments.cancel_appointment(appointment).await
    }

    /// Route any operation over the session transport.
    pub async fn dispatch(&self, operation: Operation) -> Result<Dispatched> {
        let (client, _) = self.live_parts()?;
        client.dispatch(operation).await
    }

    pub async fn execute(&self, operation: Operation) -> Result<Value> {
        let (client, _) = self.live_parts()?;
        client.execute(operation).await
    }

    pub async fn subscribe(&self, operation: Operation) -> Result<SubscriptionStream> {
        let (client, _) = self.live_parts()?;
        client.subscribe(operation).await
    }

    /// Fresh appointment lists, one per pushed update for `user_id`.
    pub async fn watch_appointments(
        &self,
        user_id: &str,
        upcoming: bool,
    ) -> Result<BoxStream<'static, AppointmentsView>> {
        let (client, appointments) = self.live_parts()?;
        let operation = Operation::subscription(
            "AppointmentUpdated",
            APPOINTMENT_UPDATES_SUBSCRIPTION,
            json!({ "user_id": user_id }),
        );
        let updates = client.subscribe(operation).await?;
        let user_id = user_id.to_string();

        Ok(updates
            .then(move |event| {
                let appointments = appointments.clone();
                let user_id = user_id.clone();
                async move {
                    match event {
                        Ok(_) => debug!(user_id = %user_id, "Appointment update pushed"),
                        Err(err) => warn!(user_id = %user_id, error = %err, "Appointment update stream failed"),
                    }
                    appointments.refetch(&user_id, upcoming).await
                }
            })
            .boxed())
    }

    /// End the session (unmount).
    ///
    /// Advances the generation, cancels in-flight work, closes the channel,
    /// clears cached lists and returns to `Unauthenticated`.
    pub async fn teardown(&self) {
        let generation = self.machine.lock().reset();
        self.attempt.lock().cancel();
        self.release(generation).await;
        info!(generation = %generation, "Integration torn down");
    }

    fn install(&self, client: Arc<SessionClient>) {
        let mut live = self.live.lock();
        if live.as_ref().is_some_and(|current| Arc::ptr_eq(&current.client, &client)) {
            return;
        }

        let appointments = AppointmentQueryService::new(client.clone(), &self.config.cache);
        *live = Some(Live { client, appointments });
    }

    async fn release(&self, generation: SessionGeneration) {
        if let Some(live) = self.live.lock().take() {
            live.appointments.clear();
        }
        self.transports.close(generation).await;
    }

    fn live_parts(&self) -> Result<(Arc<SessionClient>, AppointmentQueryService)> {
        let no_session = || CareLinkError::SessionExpired("no authenticated session".into());

        if !self.machine.lock().state().is_authenticated() {
            return Err(no_session());
        }
        self.live
            .lock()
            .as_ref()
            .filter(|live| !live.client.is_closed())
            .map(|live| (live.client.clone(), live.appointments.clone()))
            .ok_or_else(no_session)
    }
}

impl Drop for SchedulingIntegration {
    fn drop(&mut self) {
        self.attempt.get_mut().cancel();
    }
}
