//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Environment variables (`CARELINK_GATEWAY_URL` must be set)
//! 2. Otherwise a config file, searched for in several locations
//! 3. JSON and TOML are both accepted, chosen by file extension
//!
//! Every loaded configuration is validated before it is returned.
//!
//! ## Environment Variables
//! - `CARELINK_GATEWAY_URL`: Proxy gateway endpoint (required)
//! - `CARELINK_CHANNEL_URL`: Persistent channel base URL
//! - `CARELINK_HTTP_TIMEOUT_SECS`: Per-request timeout in seconds
//! - `CARELINK_HTTP_MAX_ATTEMPTS`: Total attempts per GraphQL request
//! - `CARELINK_CACHE_MAX_CAPACITY`: Cached appointment lists
//! - `CARELINK_LOG_LEVEL`: Default log filter
//! - `CARELINK_LOG_JSON`: Emit JSON log lines (true/false)
//!
//! ## File Locations
//! 1. `./carelink.{json,toml}` then `./config.{json,toml}`
//! 2. The same names in the parent and grandparent directories
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;

use carelink_domain::{CareLinkError, IntegrationConfig, Result};

const CONFIG_FILE_NAMES: [&str; 4] =
    ["carelink.json", "carelink.toml", "config.json", "config.toml"];

/// Load configuration from the environment, falling back to a file.
///
/// # Errors
/// Returns `CareLinkError::Config` when neither source yields a valid
/// configuration.
pub fn load() -> Result<IntegrationConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Environment configuration unavailable, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from `CARELINK_*` environment variables.
///
/// # Errors
/// Returns `CareLinkError::Config` if `CARELINK_GATEWAY_URL` is missing, a
/// numeric variable does not parse, or validation fails.
pub fn load_from_env() -> Result<IntegrationConfig> {
    let mut config = IntegrationConfig::new(env_var("CARELINK_GATEWAY_URL")?);

    config.channel_url = std::env::var("CARELINK_CHANNEL_URL").ok().filter(|v| !v.is_empty());
    if let Some(timeout) = env_parse("CARELINK_HTTP_TIMEOUT_SECS")? {
        config.http.timeout_secs = timeout;
    }
    if let Some(attempts) = env_parse("CARELINK_HTTP_MAX_ATTEMPTS")? {
        config.http.max_attempts = attempts;
    }
    if let Some(capacity) = env_parse("CARELINK_CACHE_MAX_CAPACITY")? {
        config.cache.max_capacity = capacity;
    }
    if let Ok(level) = std::env::var("CARELINK_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("CARELINK_LOG_JSON", false);

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file.
///
/// With `path` of `None` the standard locations are searched
/// ([`find_config_path`]).
///
/// # Errors
/// Returns `CareLinkError::Config` if the file is missing, malformed or
/// fails validation.
pub fn load_from_file(path: Option<PathBuf>) -> Result<IntegrationConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CareLinkError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => find_config_path().ok_or_else(|| {
            CareLinkError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CareLinkError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse by extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<IntegrationConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CareLinkError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CareLinkError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(CareLinkError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing config file in the standard locations, if any.
pub fn find_config_path() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        roots.push(exe_dir);
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| CareLinkError::Config(format!("Missing required environment variable: {key}")))
}

/// Optional numeric variable; set but unparseable is an error.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| CareLinkError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive).
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ALL_VARS: [&str; 7] = [
        "CARELINK_GATEWAY_URL",
        "CARELINK_CHANNEL_URL",
        "CARELINK_HTTP_TIMEOUT_SECS",
        "CARELINK_HTTP_MAX_ATTEMPTS",
        "CARELINK_CACHE_MAX_CAPACITY",
        "CARELINK_LOG_LEVEL",
        "CARELINK_LOG_JSON",
    ];

    fn clear_env() {
        for key in ALL_VARS {
            std::env::remove_var(key);
        }
    }

    fn write_temp(contents: &str, extension: &str) -> PathBuf {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        let path = temp_file.path().with_extension(extension);
        std::fs::copy(temp_file.path(), &path).unwrap();
        path
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        for (value, expected) in [("1", true), ("TRUE", true), ("on", true), ("no", false), ("0", false)] {
            std::env::set_var("CARELINK_TEST_BOOL", value);
            assert_eq!(env_bool("CARELINK_TEST_BOOL", !expected), expected, "value {value}");
        }

        std::env::remove_var("CARELINK_TEST_BOOL");
        assert!(env_bool("CARELINK_TEST_BOOL", true));
        assert!(!env_bool("CARELINK_TEST_BOOL", false));
    }

    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("CARELINK_GATEWAY_URL", "https://portal.example.com/api/gateway");
        std::env::set_var("CARELINK_CHANNEL_URL", "wss://ws.example.com/subscriptions");
        std::env::set_var("CARELINK_HTTP_TIMEOUT_SECS", "12");
        std::env::set_var("CARELINK_HTTP_MAX_ATTEMPTS", "5");
        std::env::set_var("CARELINK_CACHE_MAX_CAPACITY", "64");
        std::env::set_var("CARELINK_LOG_LEVEL", "debug");
        std::env::set_var("CARELINK_LOG_JSON", "true");

        let result = load_from_env();
        clear_env();

        let config = result.expect("config from env");
        assert_eq!(config.gateway_url, "https://portal.example.com/api/gateway");
        assert_eq!(config.channel_url.as_deref(), Some("wss://ws.example.com/subscriptions"));
        assert_eq!(config.http.timeout_secs, 12);
        assert_eq!(config.http.max_attempts, 5);
        assert_eq!(config.cache.max_capacity, 64);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_load_from_env_uses_defaults_for_optional_vars() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("CARELINK_GATEWAY_URL", "http://127.0.0.1:8787/gateway");
        let result = load_from_env();
        clear_env();

        let config = result.expect("config from env");
        assert_eq!(config.http.max_attempts, 3);
        assert_eq!(config.resolved_channel_url().unwrap(), "ws://127.0.0.1:8787/subscriptions");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_load_from_env_missing_gateway() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, CareLinkError::Config(ref msg) if msg.contains("CARELINK_GATEWAY_URL")));
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("CARELINK_GATEWAY_URL", "https://portal.example.com/gateway");
        std::env::set_var("CARELINK_HTTP_MAX_ATTEMPTS", "lots");
        let result = load_from_env();
        clear_env();

        assert!(matches!(result, Err(CareLinkError::Config(ref msg)) if msg.contains("CARELINK_HTTP_MAX_ATTEMPTS")));
    }

    #[test]
    fn test_load_from_env_rejects_invalid_channel() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("CARELINK_GATEWAY_URL", "https://portal.example.com/gateway");
        std::env::set_var("CARELINK_CHANNEL_URL", "https://portal.example.com/subscriptions");
        let result = load_from_env();
        clear_env();

        assert!(matches!(result, Err(CareLinkError::Config(_))));
    }

    #[test]
    fn test_load_from_file_json() {
        let path = write_temp(
            r#"{
                "gateway_url": "https://portal.example.com/gateway",
                "http": { "timeout_secs": 5 },
                "cache": { "ttl_secs": 600 }
            }"#,
            "json",
        );

        let config = load_from_file(Some(path.clone())).expect("config from JSON");
        assert_eq!(config.http.timeout_secs, 5);
        assert_eq!(config.http.max_attempts, 3);
        assert_eq!(config.cache.ttl_secs, Some(600));

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_toml() {
        let path = write_temp(
            r#"
gateway_url = "https://portal.example.com/gateway"
channel_url = "wss://ws.example.com/subscriptions"

[logging]
level = "warn"
json = true
"#,
            "toml",
        );

        let config = load_from_file(Some(path.clone())).expect("config from TOML");
        assert_eq!(config.channel_url.as_deref(), Some("wss://ws.example.com/subscriptions"));
        assert_eq!(config.logging.level, "warn");
        assert!(config.logging.json);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_validates() {
        let path = write_temp(r#"{ "gateway_url": "ftp://portal.example.com" }"#, "json");

        let err = load_from_file(Some(path.clone())).unwrap_err();
        assert!(err.to_string().contains("http or https"));

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_not_found() {
        let err = load_from_file(Some(PathBuf::from("/nonexistent/carelink.json"))).unwrap_err();
        assert!(matches!(err, CareLinkError::Config(_)));
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("gateway_url: x", &PathBuf::from("carelink.yaml"));
        assert!(result.is_err());
    }
}
