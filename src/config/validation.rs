//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (rates > 0, timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ApiConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ApiConfig;

/// A single semantic problem with a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
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

/// Check every semantic rule and collect all violations.
pub fn validate_config(config: &ApiConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not a socket address", config.listener.bind_address),
        ));
    }

    let rl = &config.rate_limit;
    if !(rl.requests_per_second.is_finite() && rl.requests_per_second > 0.0) {
        errors.push(ValidationError::new(
            "rate_limit.requests_per_second",
            "must be a positive number",
        ));
    }
    if rl.burst_size == 0 {
        errors.push(ValidationError::new("rate_limit.burst_size", "must be at least 1"));
    }
    if rl.sweep_interval_secs == 0 {
        errors.push(ValidationError::new(
            "rate_limit.sweep_interval_secs",
            "must be greater than 0",
        ));
    }
    if rl.idle_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "rate_limit.idle_timeout_secs",
            "must be greater than 0",
        ));
    }

    if config.tokens.activation_ttl_secs == 0 {
        errors.push(ValidationError::new(
            "tokens.activation_ttl_secs",
            "must be greater than 0",
        ));
    }
    if config.tokens.authentication_ttl_secs == 0 {
        errors.push(ValidationError::new(
            "tokens.authentication_ttl_secs",
            "must be greater than 0",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.timeouts.store_call_ms == 0 {
        errors.push(ValidationError::new("timeouts.store_call_ms", "must be greater than 0"));
    }

    let obs = &config.observability;
    if !matches!(obs.log_format.as_str(), "json" | "pretty") {
        errors.push(ValidationError::new(
            "observability.log_format",
            format!("`{}` is not one of: json, pretty", obs.log_format),
        ));
    }
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", obs.metrics_address),
        ));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than 0"));
    }
    if !(4..=31).contains(&config.security.bcrypt_cost) {
        errors.push(ValidationError::new("security.bcrypt_cost", "must be between 4 and 31"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
