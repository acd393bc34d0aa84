//! services/client/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::PathBuf;
use std::time::Duration;

use gougestop_core::UsState;
use tracing::Level;

pub const DEFAULT_API_URL: &str = "https://web-production-c5039.up.railway.app";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_url: String,
    pub token_path: PathBuf,
    pub default_state: UsState,
    pub progress_step: Duration,
    pub request_timeout: Duration,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, so it can be tested
    /// without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Backend ---
        let api_url = lookup("GOUGESTOP_API_URL")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue(
                "GOUGESTOP_API_URL".to_string(),
                format!("'{}' is not an http(s) URL", api_url),
            ));
        }

        let token_path = lookup("GOUGESTOP_TOKEN_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./.gougestop/session.json"));

        // --- Capture defaults ---
        let state_str = lookup("GOUGESTOP_DEFAULT_STATE").unwrap_or_else(|| "TX".to_string());
        let default_state = UsState::parse(&state_str).ok_or_else(|| {
            ConfigError::InvalidValue(
                "GOUGESTOP_DEFAULT_STATE".to_string(),
                format!("'{}' is not a supported state code", state_str),
            )
        })?;

        // --- Timing ---
        let progress_step = Duration::from_millis(parse_number(
            &lookup,
            "GOUGESTOP_PROGRESS_STEP_MS",
            2500,
        )?);
        let request_timeout = Duration::from_secs(parse_number(
            &lookup,
            "GOUGESTOP_REQUEST_TIMEOUT_SECS",
            60,
        )?);

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            api_url,
            token_path,
            default_state,
            progress_step,
            request_timeout,
            log_level,
        })
    }

    /// The backend host, used to keep backend calls out of the offline cache.
    pub fn api_host(&self) -> &str {
        let without_scheme = self
            .api_url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(self.api_url.as_str());
        without_scheme.split('/').next().unwrap_or(without_scheme)
    }
}

fn parse_number<F>(lookup: &F, key: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
    }
}
