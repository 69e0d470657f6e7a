//! Tracing/logging initialization.
//!
//! Configuration comes from the environment:
//!
//! - `CONDUIT_LOG`: an `EnvFilter` directive (falls back to `RUST_LOG`, then `info`)
//! - `CONDUIT_LOG_FORMAT`: `json` (default) or `pretty`

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub const FILTER_VAR: &str = "CONDUIT_LOG";
pub const FORMAT_VAR: &str = "CONDUIT_LOG_FORMAT";
const FALLBACK_FILTER_VAR: &str = "RUST_LOG";
const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown log format '{0}' (expected 'json' or 'pretty')")]
    UnknownFormat(String),

    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(ConfigError::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    pub filter: String,
    pub format: LogFormat,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::default(),
        }
    }
}

impl TracingConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let filter = lookup(FILTER_VAR)
            .or_else(|| lookup(FALLBACK_FILTER_VAR))
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        let format = match lookup(FORMAT_VAR) {
            Some(raw) if !raw.trim().is_empty() => raw.parse()?,
            _ => LogFormat::default(),
        };
        Ok(Self { filter, format })
    }

    fn env_filter(&self) -> Result<EnvFilter, ConfigError> {
        EnvFilter::try_new(&self.filter).map_err(|e| ConfigError::InvalidFilter {
            filter: self.filter.clone(),
            reason: e.to_string(),
        })
    }
}

/// Initialize tracing/logging for the process from the environment.
///
/// Safe to call multiple times (subsequent calls are no-ops). A malformed
/// environment falls back to the defaults.
pub fn init() {
    let config = TracingConfig::from_env().unwrap_or_default();
    if init_with(&config).is_err() {
        let _ = init_with(&TracingConfig::default());
    }
}

/// Initialize tracing/logging with an explicit configuration.
///
/// Installing a second global subscriber is a no-op; only a bad filter is an
/// error.
pub fn init_with(config: &TracingConfig) -> Result<(), ConfigError> {
    let filter = config.env_filter()?;

    let installed = match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .with_target(false)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .pretty()
            .with_target(true)
            .try_init(),
    };
    if installed.is_ok() {
        ::tracing::debug!(filter = %config.filter, format = %config.format, "tracing initialized");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_to_info_json() {
        let config = TracingConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, TracingConfig::default());
        assert_eq!(config.filter, "info");
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn conduit_log_wins_over_rust_log() {
        let config = TracingConfig::from_lookup(lookup(&[
            ("CONDUIT_LOG", "conduit_bus=debug"),
            ("RUST_LOG", "warn"),
        ]))
        .unwrap();
        assert_eq!(config.filter, "conduit_bus=debug");

        let config = TracingConfig::from_lookup(lookup(&[("RUST_LOG", "warn")])).unwrap();
        assert_eq!(config.filter, "warn");
    }

    #[test]
    fn format_is_case_insensitive() {
        let config =
            TracingConfig::from_lookup(lookup(&[("CONDUIT_LOG_FORMAT", "Pretty")])).unwrap();
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn unknown_format_is_an_error() {
        let err = TracingConfig::from_lookup(lookup(&[("CONDUIT_LOG_FORMAT", "xml")])).unwrap_err();
        assert_eq!(err, ConfigError::UnknownFormat("xml".into()));
    }

    #[test]
    fn bad_filter_is_reported() {
        let config = TracingConfig {
            filter: "conduit=notalevel".into(),
            format: LogFormat::Json,
        };
        assert!(matches!(
            init_with(&config),
            Err(ConfigError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: TracingConfig = serde_json::from_str(r#"{"format":"pretty"}"#).unwrap();
        assert_eq!(config.filter, "info");
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn init_is_idempotent() {
        init();
        init();
        assert!(init_with(&TracingConfig::default()).is_ok());
    }
}
