//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (proxy upstream references the service)
//! - Validate value ranges (probe intervals > 0, valid addresses)
//! - Detect port collisions between stack members
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: StackConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashMap;
use std::net::SocketAddr;

use crate::config::schema::{HealthCheckConfig, StackConfig};
use crate::orchestrator::descriptor::RestartPolicy;

/// A single semantic violation in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A bind address failed to parse as host:port.
    InvalidAddress { field: String, value: String },
    /// Two stack members declare the same port.
    PortCollision { first: String, second: String, addr: String },
    /// The proxy upstream does not name the declared service.
    UnknownUpstream { upstream: String, service: String },
    /// A restart policy string is not recognized.
    InvalidRestartPolicy { field: String, value: String },
    /// A health-check value is out of range.
    InvalidHealthCheck { field: String, reason: String },
    /// A rate-limit value is out of range.
    InvalidRateLimit { field: String, reason: String },
    /// The service name is empty.
    EmptyServiceName,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::InvalidAddress { field, value } => {
                write!(f, "{field}: '{value}' is not a valid socket address")
            }
            ValidationError::PortCollision { first, second, addr } => {
                write!(f, "{first} and {second} both bind {addr}")
            }
            ValidationError::UnknownUpstream { upstream, service } => {
                write!(f, "proxy.upstream '{upstream}' does not match service '{service}'")
            }
            ValidationError::InvalidRestartPolicy { field, value } => {
                write!(f, "{field}: unknown restart policy '{value}'")
            }
            ValidationError::InvalidHealthCheck { field, reason } => {
                write!(f, "health_check.{field}: {reason}")
            }
            ValidationError::InvalidRateLimit { field, reason } => {
                write!(f, "rate_limit.{field}: {reason}")
            }
            ValidationError::EmptyServiceName => write!(f, "service.name must not be empty"),
        }
    }
}

/// Validate a parsed manifest. Collects every violation rather than
/// stopping at the first.
pub fn validate_config(config: &StackConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service.name.trim().is_empty() {
        errors.push(ValidationError::EmptyServiceName);
    }

    let mut bound: HashMap<SocketAddr, String> = HashMap::new();
    let mut check_addr = |field: &str, value: &str, errors: &mut Vec<ValidationError>| {
        match value.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Some(prev) = bound.get(&addr) {
                    errors.push(ValidationError::PortCollision {
                        first: prev.clone(),
                        second: field.to_string(),
                        addr: addr.to_string(),
                    });
                } else {
                    bound.insert(addr, field.to_string());
                }
            }
            Err(_) => errors.push(ValidationError::InvalidAddress {
                field: field.to_string(),
                value: value.to_string(),
            }),
        }
    };

    check_addr("service.bind_address", &config.service.bind_address, &mut errors);
    check_addr("proxy.bind_address", &config.proxy.bind_address, &mut errors);
    if config.supervisor.status_enabled {
        check_addr("supervisor.status_address", &config.supervisor.status_address, &mut errors);
    }
    if config.observability.metrics_enabled {
        check_addr("observability.metrics_address", &config.observability.metrics_address, &mut errors);
    }

    if config.proxy.upstream != config.service.name {
        errors.push(ValidationError::UnknownUpstream {
            upstream: config.proxy.upstream.clone(),
            service: config.service.name.clone(),
        });
    }

    for (field, policy) in [
        ("service.restart", &config.service.restart),
        ("proxy.restart", &config.proxy.restart),
    ] {
        if policy.parse::<RestartPolicy>().is_err() {
            errors.push(ValidationError::InvalidRestartPolicy {
                field: field.to_string(),
                value: policy.clone(),
            });
        }
    }

    if let Some(hc) = &config.service.health_check {
        validate_health_check(hc, &mut errors);
    }

    if config.service.rate_limit.enabled && config.service.rate_limit.requests_per_second == 0 {
        errors.push(ValidationError::InvalidRateLimit {
            field: "requests_per_second".to_string(),
            reason: "must be greater than zero when enabled".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_health_check(hc: &HealthCheckConfig, errors: &mut Vec<ValidationError>) {
    if hc.interval_secs == 0 {
        errors.push(ValidationError::InvalidHealthCheck {
            field: "interval_secs".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    if hc.timeout_secs == 0 {
        errors.push(ValidationError::InvalidHealthCheck {
            field: "timeout_secs".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    if hc.retries == 0 {
        errors.push(ValidationError::InvalidHealthCheck {
            field: "retries".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    if !hc.path.starts_with('/') {
        errors.push(ValidationError::InvalidHealthCheck {
            field: "path".to_string(),
            reason: format!("'{}' must start with '/'", hc.path),
        });
    }
}
