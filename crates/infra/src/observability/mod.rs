//! Logging initialisation and stable error labels
//!
//! The integration only emits `tracing` events; installing a subscriber is
//! left to the host application. [`init_tracing`] is a convenience for hosts
//! without their own setup.

use carelink_domain::{CareLinkError, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Install a global `fmt` subscriber.
///
/// `RUST_LOG` overrides the configured level. Returns `false` when a global
/// subscriber was already installed (by the host or an earlier call).
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    let installed = if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.compact().try_init().is_ok()
    };

    if installed {
        tracing::debug!(level = %config.level, json = config.json, "Tracing initialised");
    }
    installed
}

/// Stable label for structured log fields.
pub fn error_label(error: &CareLinkError) -> &'static str {
    match error {
        CareLinkError::ConfigMissing(_) => "config_missing",
        CareLinkError::AuthFailed(_) => "auth_failed",
        CareLinkError::Network(_) => "network",
        CareLinkError::SessionExpired(_) => "session_expired",
        CareLinkError::FetchFailed(_) => "fetch_failed",
        CareLinkError::Config(_) => "config",
        CareLinkError::InvalidInput(_) => "invalid_input",
        CareLinkError::Cancelled(_) => "cancelled",
        CareLinkError::Internal(_) => "internal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_initialisation_is_a_no_op() {
        let config = LoggingConfig { level: "debug".into(), json: false };
        init_tracing(&config);
        assert!(!init_tracing(&config));
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(error_label(&CareLinkError::SessionExpired("x".into())), "session_expired");
        assert_eq!(error_label(&CareLinkError::Cancelled("x".into())), "cancelled");
    }
}
