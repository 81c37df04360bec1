//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, body limit > 0)
//! - Check that the listener address parses
//! - Detect conflicting or unservable routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before a config is allowed to replace a running instance

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{RouteConfig, ServiceConfig};

/// Path answered by every instance itself; routes may not claim it.
pub const HEALTH_PATH: &str = "/healthz";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {address:?} is not a socket address: {reason}")]
    InvalidBindAddress { address: String, reason: String },

    #[error("listener.max_body_bytes must be greater than zero")]
    ZeroBodyLimit,

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("log.level {0:?} is not one of trace, debug, info, warn, error")]
    UnknownLogLevel(String),

    #[error("route path {0:?} must start with '/'")]
    RelativeRoutePath(String),

    #[error("route path {0:?} contains a capture or wildcard segment")]
    DynamicRoutePath(String),

    #[error("route path {0:?} is reserved")]
    ReservedRoutePath(String),

    #[error("route path {0:?} is declared more than once")]
    DuplicateRoutePath(String),

    #[error("route {path:?} has invalid status code {status}")]
    InvalidStatus { path: String, status: u16 },
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = config.listener.bind_address.parse::<SocketAddr>() {
        errors.push(ValidationError::InvalidBindAddress {
            address: config.listener.bind_address.clone(),
            reason: e.to_string(),
        });
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }
    if !LOG_LEVELS.contains(&config.log.level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::UnknownLogLevel(config.log.level.clone()));
    }

    let mut seen = HashSet::new();
    for route in &config.routes {
        validate_route(route, &mut errors);
        if !seen.insert(route.path.as_str()) {
            errors.push(ValidationError::DuplicateRoutePath(route.path.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_route(route: &RouteConfig, errors: &mut Vec<ValidationError>) {
    let path = &route.path;
    if !path.starts_with('/') {
        errors.push(ValidationError::RelativeRoutePath(path.clone()));
    } else if path == HEALTH_PATH {
        errors.push(ValidationError::ReservedRoutePath(path.clone()));
    } else if path.contains(['{', '}'])
        || path
            .split('/')
            .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
    {
        errors.push(ValidationError::DynamicRoutePath(path.clone()));
    }

    if !(100..=599).contains(&route.status) {
        errors.push(ValidationError::InvalidStatus {
            path: path.clone(),
            status: route.status,
        });
    }
}
