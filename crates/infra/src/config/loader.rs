//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If the required variables are missing, falls back to a config file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! Required when loading from the environment:
//! - `MINUTEFLOW_DB_PATH`: Database file path
//! - `MINUTEFLOW_DOCS_BASE_URL`: Document store base URL
//! - `MINUTEFLOW_CHAT_BASE_URL`: Chat API base URL
//!
//! Optional overrides (defaults apply otherwise):
//! - `MINUTEFLOW_DB_POOL_SIZE`
//! - `MINUTEFLOW_MAX_ATTEMPTS`, `MINUTEFLOW_BASE_DELAY_MS`,
//!   `MINUTEFLOW_MAX_DELAY_MS`
//! - `MINUTEFLOW_WORKER_CONCURRENCY`, `MINUTEFLOW_SWEEP_INTERVAL_SECS`,
//!   `MINUTEFLOW_SWEEP_BATCH_SIZE`
//! - `MINUTEFLOW_HTTP_TIMEOUT_MS`
//! - `MINUTEFLOW_RATE_LIMIT_RPS_DOCS`, `MINUTEFLOW_RATE_LIMIT_RPS_CHAT`
//! - `MINUTEFLOW_APPROVAL_CHANNEL`

use std::path::{Path, PathBuf};
use std::str::FromStr;

use minuteflow_domain::{Config, MinuteflowError, Result};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
pub fn load() -> Result<Config> {
    // Pick up a .env file when present, matching the upstream service
    let _ = dotenvy::dotenv();

    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// The required variables must be present; optional ones override the
/// defaults.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.database.path = env_var("MINUTEFLOW_DB_PATH")?;
    config.dependencies.documents.base_url = env_var("MINUTEFLOW_DOCS_BASE_URL")?;
    config.dependencies.chat.base_url = env_var("MINUTEFLOW_CHAT_BASE_URL")?;

    override_parsed(&mut config.database.pool_size, "MINUTEFLOW_DB_POOL_SIZE")?;
    override_parsed(&mut config.dispatch.max_attempts, "MINUTEFLOW_MAX_ATTEMPTS")?;
    override_parsed(&mut config.dispatch.base_delay_ms, "MINUTEFLOW_BASE_DELAY_MS")?;
    override_parsed(&mut config.dispatch.max_delay_ms, "MINUTEFLOW_MAX_DELAY_MS")?;
    override_parsed(&mut config.dispatch.worker_concurrency, "MINUTEFLOW_WORKER_CONCURRENCY")?;
    override_parsed(&mut config.dispatch.sweep_interval_secs, "MINUTEFLOW_SWEEP_INTERVAL_SECS")?;
    override_parsed(&mut config.dispatch.sweep_batch_size, "MINUTEFLOW_SWEEP_BATCH_SIZE")?;
    override_parsed(
        &mut config.dependencies.documents.rate_limit_points,
        "MINUTEFLOW_RATE_LIMIT_RPS_DOCS",
    )?;
    override_parsed(&mut config.dependencies.chat.rate_limit_points, "MINUTEFLOW_RATE_LIMIT_RPS_CHAT")?;

    if let Ok(timeout) = std::env::var("MINUTEFLOW_HTTP_TIMEOUT_MS") {
        let timeout = parse_value(&timeout, "MINUTEFLOW_HTTP_TIMEOUT_MS")?;
        config.dependencies.documents.timeout_ms = timeout;
        config.dependencies.chat.timeout_ms = timeout;
    }

    if let Ok(channel) = std::env::var("MINUTEFLOW_APPROVAL_CHANNEL") {
        config.approval_channel = channel;
    }

    config.validate().map_err(MinuteflowError::Config)?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(MinuteflowError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            MinuteflowError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| MinuteflowError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Probe the standard locations for a config file.
pub fn probe_config_paths() -> Option<PathBuf> {
    let candidates = [
        "config.json",
        "config.toml",
        "minuteflow.json",
        "minuteflow.toml",
        "../config.json",
        "../config.toml",
    ];

    candidates.iter().map(PathBuf::from).find(|path| path.exists())
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let config: Config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(contents)
            .map_err(|e| MinuteflowError::Config(format!("Invalid JSON config: {e}")))?,
        Some("toml") => toml::from_str(contents)
            .map_err(|e| MinuteflowError::Config(format!("Invalid TOML config: {e}")))?,
        other => {
            return Err(MinuteflowError::Config(format!(
                "Unsupported config format: {other:?} (expected .json or .toml)"
            )));
        }
    };

    config.validate().map_err(MinuteflowError::Config)?;
    Ok(config)
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| MinuteflowError::Config(format!("Missing environment variable: {name}")))
}

fn override_parsed<T: FromStr>(target: &mut T, name: &str) -> Result<()>
where
    T::Err: std::fmt::Display,
{
    if let Ok(raw) = std::env::var(name) {
        *target = parse_value(&raw, name)?;
    }
    Ok(())
}

fn parse_value<T: FromStr>(raw: &str, name: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| MinuteflowError::Config(format!("Invalid {name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_toml() -> &'static str {
        r##"
            approval_channel = "#minutes-approvals"

            [database]
            path = "minuteflow.db"
            pool_size = 8

            [dispatch]
            max_attempts = 4
            base_delay_ms = 250
            max_delay_ms = 5000
            worker_concurrency = 3
            sweep_interval_secs = 15
            sweep_batch_size = 20

            [queue]
            poll_interval_ms = 25
            max_attempts = 1
            retry_delay_ms = 500

            [dependencies.documents]
            base_url = "https://docs.internal"
            failure_threshold = 5
            recovery_time_ms = 30000
            half_open_max_successes = 3
            rate_limit_points = 5
            rate_limit_window_secs = 1
            timeout_ms = 10000

            [dependencies.chat]
            base_url = "https://chat.internal"
            failure_threshold = 5
            recovery_time_ms = 30000
            half_open_max_successes = 3
            rate_limit_points = 10
            rate_limit_window_secs = 1
            timeout_ms = 10000
        "##
    }

    #[test]
    fn parses_toml_config() {
        let config = parse_config(full_toml(), Path::new("config.toml")).expect("parses");

        assert_eq!(config.database.pool_size, 8);
        assert_eq!(config.dispatch.max_attempts, 4);
        assert_eq!(config.dependencies.chat.rate_limit_points, 10);
        assert_eq!(config.approval_channel, "#minutes-approvals");
    }

    #[test]
    fn parses_json_config() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();

        let parsed = parse_config(&json, Path::new("config.json")).expect("parses");
        assert_eq!(parsed, config);
    }

    #[test]
    fn rejects_unknown_extensions() {
        let err = parse_config("{}", Path::new("config.yaml")).unwrap_err();
        assert!(matches!(err, MinuteflowError::Config(_)));
    }

    #[test]
    fn rejects_invalid_values() {
        let broken = full_toml().replace("max_attempts = 4", "max_attempts = 0");
        let err = parse_config(&broken, Path::new("config.toml")).unwrap_err();
        assert!(matches!(err, MinuteflowError::Config(message) if message.contains("max_attempts")));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = load_from_file(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap_err();
        assert!(matches!(err, MinuteflowError::Config(_)));
    }
}
