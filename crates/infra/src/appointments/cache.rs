//! Last-known appointment lists, keyed by user and filter
//!
//! Holds the newest successful list and the newest classified failure side
//! by side: a failed revalidation records its error without discarding the
//! list the caller is already showing.

use std::sync::Arc;

use carelink_domain::{Appointment, CacheConfig, ErrorRecord};
use moka::sync::Cache;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppointmentKey {
    pub user_id: String,
    pub upcoming: bool,
}

impl AppointmentKey {
    pub fn new(user_id: impl Into<String>, upcoming: bool) -> Self {
        Self { user_id: user_id.into(), upcoming }
    }

    /// Upstream list filter.
    pub fn filter(&self) -> &'static str {
        if self.upcoming {
            "upcoming"
        } else {
            "past"
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CachedAppointments {
    /// `None` until a fetch for this key has succeeded
    pub items: Option<Arc<Vec<Appointment>>>,
    /// Failure of the most recent fetch, cleared by the next success
    pub error: Option<ErrorRecord>,
}

pub struct AppointmentCache {
    entries: Cache<AppointmentKey, CachedAppointments>,
}

impl AppointmentCache {
    pub fn new(config: &CacheConfig) -> Self {
        let mut builder = Cache::builder().max_capacity(config.max_capacity);
        if let Some(ttl) = config.ttl() {
            builder = builder.time_to_live(ttl);
        }

        tracing::info!(
            max_capacity = config.max_capacity,
            ttl_seconds = config.ttl_secs,
            "Appointment cache configured"
        );

        Self { entries: builder.build() }
    }

    pub fn get(&self, key: &AppointmentKey) -> Option<CachedAppointments> {
        self.entries.get(key)
    }

    pub fn store_items(&self, key: &AppointmentKey, items: Arc<Vec<Appointment>>) {
        self.entries.insert(key.clone(), CachedAppointments { items: Some(items), error: None });
    }

    /// Record a failure, keeping any list already cached for `key`.
    pub fn store_error(&self, key: &AppointmentKey, error: ErrorRecord) {
        let items = self.entries.get(key).and_then(|cached| cached.items);
        self.entries.insert(key.clone(), CachedAppointments { items, error: Some(error) });
    }

    pub fn clear(&self) {
        self.entries.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use carelink_domain::ErrorKind;

    use super::*;

    fn cache() -> AppointmentCache {
        AppointmentCache::new(&CacheConfig::default())
    }

    #[test]
    fn error_keeps_previous_items() {
        let cache = cache();
        let key = AppointmentKey::new("u1", true);
        cache.store_items(&key, Arc::new(Vec::new()));

        cache.store_error(&key, ErrorRecord::new(ErrorKind::FetchFailed, "boom"));

        let cached = cache.get(&key).unwrap();
        assert!(cached.items.is_some());
        assert_eq!(cached.error.map(|e| e.message), Some("boom".to_string()));
    }

    #[test]
    fn success_clears_error() {
        let cache = cache();
        let key = AppointmentKey::new("u1", false);
        cache.store_error(&key, ErrorRecord::new(ErrorKind::FetchFailed, "boom"));
        cache.store_items(&key, Arc::new(Vec::new()));

        assert!(cache.get(&key).unwrap().error.is_none());
    }

    #[test]
    fn filters_are_cached_separately() {
        let cache = cache();
        cache.store_items(&AppointmentKey::new("u1", true), Arc::new(Vec::new()));

        assert!(cache.get(&AppointmentKey::new("u1", false)).is_none());
        assert_eq!(AppointmentKey::new("u1", false).filter(), "past");
    }

    #[test]
    fn clear_drops_everything() {
        let cache = cache();
        let key = AppointmentKey::new("u1", true);
        cache.store_items(&key, Arc::new(Vec::new()));
        cache.clear();
        assert!(cache.get(&key).is_none());
    }
}
