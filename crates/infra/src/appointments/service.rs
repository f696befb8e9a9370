//! Appointment query service
//!
//! Stale-while-revalidate: [`AppointmentQueryService::get_appointments`]
//! answers immediately from the cache and starts a background revalidation.
//! Overlapping fetches for the same user and filter share one in-flight
//! request.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use carelink_core::{
    appointments_from_data, classify_fetch_error, normalize_appointments, OperationExecutor,
};
use carelink_domain::{
    Appointment, CacheConfig, CareLinkError, ErrorKind, ErrorRecord, Operation, Result,
};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::cache::{AppointmentCache, AppointmentKey, CachedAppointments};

pub const APPOINTMENTS_QUERY: &str = r#"
query GetAppointments($user_id: ID, $filter: String) {
  appointments(user_id: $user_id, filter: $filter, should_paginate: false) {
    id
    date
    start
    end
    length
    appointment_label
    contact_type
    pm_status
    zoom_join_url
    external_videochat_url
    zoom_dial_in_info
    can_client_cancel
    can_client_reschedule
    appointment_type { id name }
    provider { id name }
  }
}
"#;

pub const CANCEL_APPOINTMENT_MUTATION: &str = r#"
mutation CancelAppointment($id: ID, $pm_status: String) {
  updateAppointment(input: { id: $id, pm_status: $pm_status }) {
    appointment { id pm_status }
    messages { field message }
  }
}
"#;

const CANCELLED_STATUS: &str = "Cancelled";

type FetchOutcome = std::result::Result<Arc<Vec<Appointment>>, CareLinkError>;
type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

struct InFlight {
    id: u64,
    fetch: SharedFetch,
}

struct Inner {
    executor: Arc<dyn OperationExecutor>,
    cache: AppointmentCache,
    in_flight: Mutex<HashMap<AppointmentKey, InFlight>>,
    next_fetch: AtomicU64,
}

#[derive(Clone)]
pub struct AppointmentQueryService {
    inner: Arc<Inner>,
}

/// Snapshot returned to callers
#[derive(Debug, Clone)]
pub struct AppointmentsView {
    pub items: Arc<Vec<Appointment>>,
    /// True only while the very first fetch for this user/filter runs
    pub loading: bool,
    pub error: Option<ErrorRecord>,
    refetch: Refetch,
}

impl AppointmentsView {
    fn from_cache(cached: Option<CachedAppointments>, refetch: Refetch) -> Self {
        match cached {
            Some(cached) => Self {
                items: cached.items.unwrap_or_default(),
                loading: false,
                error: cached.error,
                refetch,
            },
            None => Self { items: Arc::default(), loading: true, error: None, refetch },
        }
    }

    fn idle(refetch: Refetch) -> Self {
        Self { items: Arc::default(), loading: false, error: None, refetch }
    }

    /// Re-issue the query, joining any fetch already in flight.
    pub async fn refetch(&self) -> AppointmentsView {
        self.refetch.run().await
    }
}

/// Handle that re-runs the query behind a view
#[derive(Clone)]
pub struct Refetch {
    service: AppointmentQueryService,
    user_id: String,
    upcoming: bool,
}

impl Refetch {
    pub async fn run(&self) -> AppointmentsView {
        self.service.refetch(&self.user_id, self.upcoming).await
    }
}

impl fmt::Debug for Refetch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Refetch")
            .field("user_id", &self.user_id)
            .field("upcoming", &self.upcoming)
            .finish()
    }
}

impl AppointmentQueryService {
    pub fn new(executor: Arc<dyn OperationExecutor>, cache_config: &CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                executor,
                cache: AppointmentCache::new(cache_config),
                in_flight: Mutex::new(HashMap::new()),
                next_fetch: AtomicU64::new(1),
            }),
        }
    }

    /// Last known list plus a background revalidation.
    ///
    /// An empty `user_id` is a no-op: empty, not loading, nothing issued.
    /// Must be called from within a Tokio runtime for the revalidation to
    /// run.
    pub fn get_appointments(&self, user_id: &str, upcoming: bool) -> AppointmentsView {
        let refetch = self.refetch_handle(user_id, upcoming);
        if user_id.trim().is_empty() {
            return AppointmentsView::idle(refetch);
        }

        let key = AppointmentKey::new(user_id, upcoming);
        let cached = self.inner.cache.get(&key);
        let fetch = self.fetch(key);

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    let _ = fetch.await;
                });
            }
            Err(_) => warn!("No Tokio runtime; appointment revalidation skipped"),
        }

        AppointmentsView::from_cache(cached, refetch)
    }

    /// Fetch now and return the settled view.
    ///
    /// A fetch cut short because the session transport closed is reported
    /// as `SessionExpired`: retrying through this service cannot succeed.
    pub async fn refetch(&self, user_id: &str, upcoming: bool) -> AppointmentsView {
        let refetch = self.refetch_handle(user_id, upcoming);
        if user_id.trim().is_empty() {
            return AppointmentsView::idle(refetch);
        }

        let key = AppointmentKey::new(user_id, upcoming);
        let outcome = self.fetch(key.clone()).await;

        let mut view = AppointmentsView::from_cache(self.inner.cache.get(&key), refetch);
        if let Err(err) = &outcome {
            if err.is_cancelled() {
                view.loading = false;
                view.error = Some(ErrorRecord::new(ErrorKind::SessionExpired, err.message()));
            }
        }
        view
    }

    /// Cancel through the `updateAppointment` mutation.
    ///
    /// # Errors
    /// `InvalidInput` when the server does not allow cancelling this
    /// appointment or it is already cancelled; otherwise the transport or
    /// mutation error.
    pub async fn cancel_appointment(&self, appointment: &Appointment) -> Result<()> {
        if !appointment.can_cancel {
            return Err(CareLinkError::InvalidInput(format!(
                "appointment {} cannot be cancelled by the client",
                appointment.id
            )));
        }
        if appointment.status.is_cancelled() {
            return Err(CareLinkError::InvalidInput(format!(
                "appointment {} is already cancelled",
                appointment.id
            )));
        }

        let operation = Operation::mutation(
            "CancelAppointment",
            CANCEL_APPOINTMENT_MUTATION,
            json!({ "id": appointment.id, "pm_status": CANCELLED_STATUS }),
        );
        let data = self.inner.executor.execute(operation).await?;

        let messages: Vec<&str> = data
            .pointer("/updateAppointment/messages")
            .and_then(Value::as_array)
            .map(|messages| {
                messages.iter().filter_map(|m| m.get("message").and_then(Value::as_str)).collect()
            })
            .unwrap_or_default();
        if !messages.is_empty() {
            return Err(CareLinkError::FetchFailed(messages.join(", ")));
        }

        self.inner.cache.clear();
        info!(appointment_id = %appointment.id, "Appointment cancelled");
        Ok(())
    }

    /// Drop every cached list.
    pub fn clear(&self) {
        self.inner.cache.clear();
    }

    fn refetch_handle(&self, user_id: &str, upcoming: bool) -> Refetch {
        Refetch { service: self.clone(), user_id: user_id.to_string(), upcoming }
    }

    /// The in-flight fetch for `key`, started if none is running.
    fn fetch(&self, key: AppointmentKey) -> SharedFetch {
        let mut in_flight = self.inner.in_flight.lock();
        if let Some(existing) = in_flight.get(&key) {
            debug!(user_id = %key.user_id, filter = key.filter(), "Joining in-flight appointment fetch");
            return existing.fetch.clone();
        }

        let id = self.inner.next_fetch.fetch_add(1, Ordering::Relaxed);
        let fetch = run_fetch(Arc::downgrade(&self.inner), key.clone(), id).boxed().shared();
        in_flight.insert(key, InFlight { id, fetch: fetch.clone() });
        fetch
    }
}

fn appointments_query(key: &AppointmentKey) -> Operation {
    Operation::query(
        "GetAppointments",
        APPOINTMENTS_QUERY,
        json!({ "user_id": key.user_id, "filter": key.filter() }),
    )
}

async fn run_fetch(inner: Weak<Inner>, key: AppointmentKey, id: u64) -> FetchOutcome {
    let Some(executor) = inner.upgrade().map(|inner| inner.executor.clone()) else {
        return Err(CareLinkError::Cancelled("appointment service dropped".into()));
    };

    debug!(user_id = %key.user_id, filter = key.filter(), "Fetching appointments");
    let outcome = executor.execute(appointments_query(&key)).await.map(|data| {
        Arc::new(normalize_appointments(appointments_from_data(&data), key.upcoming))
    });

    if let Some(inner) = inner.upgrade() {
        inner.settle(&key, id, &outcome);
    }
    outcome
}

impl Inner {
    fn settle(&self, key: &AppointmentKey, id: u64, outcome: &FetchOutcome) {
        match outcome {
            Ok(items) => {
                debug!(user_id = %key.user_id, count = items.len(), "Appointments revalidated");
                self.cache.store_items(key, items.clone());
            }
            Err(err) if err.is_cancelled() => {
                debug!(user_id = %key.user_id, "Discarding appointment fetch from closed session");
            }
            Err(err) => {
                let record = classify_fetch_error(err);
                warn!(user_id = %key.user_id, kind = %record.kind, error = %record.message, "Appointment fetch failed");
                self.cache.store_error(key, record);
            }
        }

        let mut in_flight = self.in_flight.lock();
        if in_flight.get(key).is_some_and(|current| current.id == id) {
            in_flight.remove(key);
        }
    }
}
