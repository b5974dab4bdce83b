//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderValue;
use thiserror::Error;

use crate::config::schema::AppConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
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

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("{:?} is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be greater than 0"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    let content_type = &config.routing.default_content_type;
    if content_type.trim().is_empty() || HeaderValue::from_str(content_type).is_err() {
        errors.push(ValidationError::new(
            "routing.default_content_type",
            format!("{content_type:?} is not a valid header value"),
        ));
    }

    if config.cache.cleanup_interval_ms == 0 {
        errors.push(ValidationError::new("cache.cleanup_interval_ms", "must be greater than 0"));
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("expected one of {}", LOG_LEVELS.join(", ")),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("{:?} is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
