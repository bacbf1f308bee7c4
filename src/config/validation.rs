//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the rewrite method is a valid HTTP method token
//! - Validate value ranges (capacities > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function of the config

use axum::http::Method;
use std::net::SocketAddr;

use crate::config::schema::{ProxyConfig, ServerConfig};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("rewrite_method {0:?} is not a valid HTTP method")]
    InvalidRewriteMethod(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{field} {value:?} is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },
}

/// Validate the library-level proxy settings.
pub fn validate_proxy_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !config.rewrite_method.is_empty()
        && Method::from_bytes(config.rewrite_method.as_bytes()).is_err()
    {
        errors.push(ValidationError::InvalidRewriteMethod(
            config.rewrite_method.clone(),
        ));
    }
    if config.conduit_capacity == 0 {
        errors.push(ValidationError::Zero("conduit_capacity"));
    }
    if config.max_message_size == 0 {
        errors.push(ValidationError::Zero("max_message_size"));
    }
    if config.auth_timeout_secs == Some(0) {
        errors.push(ValidationError::Zero("auth_timeout_secs"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a full server configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = validate_proxy_config(&config.proxy).err().unwrap_or_default();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
