//! Configuration validation.
//!
//! Semantic checks that serde cannot express. Returns every error found, not
//! just the first, and runs before a config is accepted.

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{BreakerConfig, GatewayConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("invalid PORT override '{0}'")]
    InvalidPort(String),

    #[error("no dependencies configured")]
    NoDependencies,

    #[error("dependency name '{0}' must be non-empty and contain no ':' or whitespace")]
    InvalidDependencyName(String),

    #[error("duplicate dependency name '{0}'")]
    DuplicateDependency(String),

    #[error("dependency '{name}' has invalid target '{target}'")]
    InvalidTarget { name: String, target: String },

    #[error("{scope}: {field} {reason}")]
    InvalidBreaker {
        scope: String,
        field: &'static str,
        reason: &'static str,
    },

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),
}

/// Validate a configuration, collecting all errors.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue("listener.request_timeout_secs"));
    }
    if config.downstream.connect_timeout_ms == 0 {
        errors.push(ValidationError::ZeroValue("downstream.connect_timeout_ms"));
    }
    if config.downstream.request_timeout_ms == 0 {
        errors.push(ValidationError::ZeroValue("downstream.request_timeout_ms"));
    }
    if config.downstream.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroValue("downstream.max_body_bytes"));
    }
    if config.shared_store.lease_secs == 0 {
        errors.push(ValidationError::ZeroValue("shared_store.lease_secs"));
    }
    if config.shared_store.io_timeout_ms == 0 {
        errors.push(ValidationError::ZeroValue("shared_store.io_timeout_ms"));
    }

    validate_breaker("breaker", &config.breaker, &mut errors);

    if config.dependencies.is_empty() {
        errors.push(ValidationError::NoDependencies);
    }

    let mut seen = HashSet::new();
    for dependency in &config.dependencies {
        if !is_valid_name(&dependency.name) {
            errors.push(ValidationError::InvalidDependencyName(dependency.name.clone()));
        } else if !seen.insert(dependency.name.as_str()) {
            errors.push(ValidationError::DuplicateDependency(dependency.name.clone()));
        }

        let target_ok = url::Url::parse(&dependency.target)
            .map(|u| u.scheme() == "http" && u.host().is_some())
            .unwrap_or(false);
        if !target_ok {
            errors.push(ValidationError::InvalidTarget {
                name: dependency.name.clone(),
                target: dependency.target.clone(),
            });
        }

        if let Some(breaker) = &dependency.breaker {
            validate_breaker(&format!("dependency '{}'", dependency.name), breaker, &mut errors);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Names become part of the shared key `circuit:<name>:open`.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(':') && !name.chars().any(char::is_whitespace)
}

fn validate_breaker(scope: &str, breaker: &BreakerConfig, errors: &mut Vec<ValidationError>) {
    let mut push = |field, reason| {
        errors.push(ValidationError::InvalidBreaker {
            scope: scope.to_string(),
            field,
            reason,
        })
    };

    if breaker.min_requests == 0 {
        push("min_requests", "must be at least 1");
    }
    let ratio = breaker.failure_ratio_threshold;
    if !(ratio > 0.0 && ratio <= 1.0) {
        push("failure_ratio_threshold", "must be in (0, 1]");
    }
    if breaker.half_open_max_probes == 0 {
        push("half_open_max_probes", "must be at least 1");
    }
    if breaker.open_cooldown_secs == 0 {
        push("open_cooldown_secs", "must be greater than zero");
    }
}
