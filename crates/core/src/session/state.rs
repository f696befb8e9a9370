//! Session state machine
//!
//! One machine per integration instance. Every authentication attempt is
//! tagged with a fresh [`SessionGeneration`]; a result is applied only if its
//! tag is still the current generation, so a slow response from an earlier
//! attempt can never overwrite a newer session.

use carelink_domain::{
    AuthenticatedSession, ErrorRecord, Result, SessionGeneration, SessionState,
};
use tracing::{debug, info, warn};

/// Outcome of feeding an authentication result into the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The result belonged to the current attempt and is now the state.
    Applied,
    /// A newer attempt (or a teardown) superseded the result; it was dropped.
    Stale,
}

#[derive(Debug, Default)]
pub struct SessionMachine {
    state: SessionState,
    generation: SessionGeneration,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn generation(&self) -> SessionGeneration {
        self.generation
    }

    pub fn is_current(&self, generation: SessionGeneration) -> bool {
        self.generation == generation
    }

    /// Start a new attempt: bump the generation and enter `Authenticating`.
    pub fn begin(&mut self) -> SessionGeneration {
        self.generation = self.generation.next();
        self.state = SessionState::Authenticating { generation: self.generation };
        debug!(generation = %self.generation, "Authentication attempt started");
        self.generation
    }

    /// Apply the result of the attempt tagged `generation`.
    pub fn complete(
        &mut self,
        generation: SessionGeneration,
        outcome: Result<AuthenticatedSession>,
    ) -> Transition {
        if !self.is_current(generation) {
            debug!(
                stale = %generation,
                current = %self.generation,
                "Discarding authentication result from superseded attempt"
            );
            return Transition::Stale;
        }

        self.state = match outcome {
            Ok(session) => {
                info!(generation = %generation, user_id = %session.user_id, "Session authenticated");
                SessionState::Authenticated(session)
            }
            Err(err) => {
                let record = ErrorRecord::from(&err);
                warn!(generation = %generation, kind = %record.kind, error = %record.message, "Authentication failed");
                SessionState::Failed(record)
            }
        };
        Transition::Applied
    }

    /// End the session (unmount): any in-flight attempt becomes stale.
    pub fn reset(&mut self) -> SessionGeneration {
        self.generation = self.generation.next();
        self.state = SessionState::Unauthenticated;
        info!(generation = %self.generation, "Session reset");
        self.generation
    }
}
