//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0, ports valid)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::{AppConfig, StoreBackend};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a socket address", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be > 0"));
    }

    let cache = &config.cache;
    if cache.backend == StoreBackend::Redis {
        if cache.host.trim().is_empty() {
            errors.push(ValidationError::new("cache.host", "must not be empty"));
        }
        if cache.port == 0 {
            errors.push(ValidationError::new("cache.port", "must be > 0"));
        }
        if cache.username.is_some() && cache.password.is_none() {
            errors.push(ValidationError::new(
                "cache.username",
                "requires cache.password to be set",
            ));
        }
    }
    if cache.connect_timeout_ms == 0 {
        errors.push(ValidationError::new("cache.connect_timeout_ms", "must be > 0"));
    }
    if cache.keep_alive_secs == 0 {
        errors.push(ValidationError::new("cache.keep_alive_secs", "must be > 0"));
    }
    if cache.reconnect.max_delay_ms < cache.reconnect.step_ms {
        errors.push(ValidationError::new(
            "cache.reconnect.max_delay_ms",
            "must be >= cache.reconnect.step_ms",
        ));
    }

    let contact = &config.contact_form;
    if contact.limit == 0 {
        errors.push(ValidationError::new("contact_form.limit", "must be > 0"));
    }
    if contact.window_secs == 0 {
        errors.push(ValidationError::new("contact_form.window_secs", "must be > 0"));
    }
    if contact.prefix.is_empty() {
        errors.push(ValidationError::new("contact_form.prefix", "must not be empty"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address when metrics are enabled",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
