//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: '{value}'")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: optional TOML file, then environment overrides, then validation.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => AppConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay `REDIS_*` variables onto the cache section.
///
/// `lookup` abstracts the environment so tests do not mutate process state.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let cache = &mut config.cache;

    if let Some(host) = lookup("REDIS_HOST") {
        cache.host = host;
    }
    if let Some(port) = lookup("REDIS_PORT") {
        cache.port = parse_env("REDIS_PORT", port)?;
    }
    if let Some(username) = lookup("REDIS_USERNAME").filter(|v| !v.is_empty()) {
        cache.username = Some(username);
    }
    if let Some(password) = lookup("REDIS_PASSWORD").filter(|v| !v.is_empty()) {
        cache.password = Some(password);
    }
    if let Some(tls) = lookup("REDIS_TLS") {
        cache.tls = match tls.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" | "" => false,
            _ => return Err(ConfigError::Env { var: "REDIS_TLS", value: tls }),
        };
    }
    if let Some(timeout) = lookup("REDIS_CONNECT_TIMEOUT_MS") {
        cache.connect_timeout_ms = parse_env("REDIS_CONNECT_TIMEOUT_MS", timeout)?;
    }
    if let Some(keep_alive) = lookup("REDIS_KEEP_ALIVE_SECS") {
        cache.keep_alive_secs = parse_env("REDIS_KEEP_ALIVE_SECS", keep_alive)?;
    }

    Ok(())
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })
}
