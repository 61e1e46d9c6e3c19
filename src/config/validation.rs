//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, burst >= 1)
//! - Check addresses parse before anything binds
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;

/// Environments the server knows how to run in.
pub const ENVIRONMENTS: [&str; 3] = ["development", "staging", "production"];

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("server.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("server.env must be one of development|staging|production, got {0:?}")]
    Environment(String),

    #[error("server.{0} must be greater than zero")]
    Zero(&'static str),

    #[error("rate_limit.requests_per_second must be a positive number, got {0}")]
    RefillRate(f64),

    #[error("rate_limit.stale_after_secs ({stale_after}) must not be shorter than sweep_interval_secs ({interval})")]
    StaleBeforeSweep { stale_after: u64, interval: u64 },

    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),
}

/// Check every semantic rule and collect all failures.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let server = &config.server;

    if server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(server.bind_address.clone()));
    }
    if !ENVIRONMENTS.contains(&server.env.as_str()) {
        errors.push(ValidationError::Environment(server.env.clone()));
    }
    if server.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero("request_timeout_secs"));
    }
    if server.shutdown_timeout_secs == 0 {
        errors.push(ValidationError::Zero("shutdown_timeout_secs"));
    }
    if server.max_connections == 0 {
        errors.push(ValidationError::Zero("max_connections"));
    }

    // A disabled limiter never reads its numbers.
    let limiter = &config.rate_limit;
    if limiter.enabled {
        if !(limiter.requests_per_second.is_finite() && limiter.requests_per_second > 0.0) {
            errors.push(ValidationError::RefillRate(limiter.requests_per_second));
        }
        if limiter.burst == 0 {
            errors.push(ValidationError::Zero("rate_limit.burst"));
        }
        if limiter.sweep_interval_secs == 0 {
            errors.push(ValidationError::Zero("rate_limit.sweep_interval_secs"));
        }
        if limiter.stale_after_secs < limiter.sweep_interval_secs {
            errors.push(ValidationError::StaleBeforeSweep {
                stale_after: limiter.stale_after_secs,
                interval: limiter.sweep_interval_secs,
            });
        }
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
