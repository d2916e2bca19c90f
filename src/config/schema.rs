//! Configuration schema definitions.
//!
//! This module defines the complete manifest structure for a supervised
//! stack. All types derive Serde traits for deserialization from config
//! files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration for the service stack.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StackConfig {
    /// The application service descriptor.
    pub service: ServiceConfig,

    /// Reverse proxy settings (profile-gated).
    pub proxy: ProxyConfig,

    /// Supervisor settings (restart backoff, status endpoint).
    pub supervisor: SupervisorConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Application service descriptor.
///
/// Mirrors the orchestration manifest entry for the service: name, port,
/// environment, restart policy, and an optional health-check override.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service name, used in logs, metrics, and proxy upstream references.
    pub name: String,

    /// Bind address for the service (e.g., "127.0.0.1:8000").
    pub bind_address: String,

    /// Environment variables passed to the service at start.
    pub env: BTreeMap<String, String>,

    /// Restart policy applied by the supervisor.
    pub restart: String,

    /// Orchestration-level health check. When present, overrides the
    /// probe spec baked into the service runtime.
    pub health_check: Option<HealthCheckConfig>,

    /// Per-client rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Deployment profiles this service is active under. Empty = always.
    pub profiles: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "sql-schema-parser".to_string(),
            bind_address: "127.0.0.1:8000".to_string(),
            env: BTreeMap::new(),
            restart: "unless-stopped".to_string(),
            health_check: Some(HealthCheckConfig::default()),
            rate_limit: RateLimitConfig::default(),
            profiles: Vec::new(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Maximum requests per second per client IP.
    pub requests_per_second: u32,

    /// Burst capacity.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 50,
            burst_size: 100,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Probe interval in seconds.
    pub interval_secs: u64,

    /// Per-probe timeout in seconds.
    pub timeout_secs: u64,

    /// Path to probe for HTTP health checks.
    pub path: String,

    /// Consecutive failures before the service is marked unhealthy.
    pub retries: u32,

    /// Startup grace period in seconds. Failures inside this window do
    /// not count toward the retry threshold.
    pub start_period_secs: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            timeout_secs: 10,
            path: "/v1/health".to_string(),
            retries: 3,
            start_period_secs: 40,
        }
    }
}

/// Reverse proxy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Public bind address (e.g., "0.0.0.0:80").
    pub bind_address: String,

    /// Name of the upstream service to forward to. Must match
    /// `service.name`.
    pub upstream: String,

    /// Deployment profiles the proxy is active under. The proxy is absent
    /// unless the active profile matches.
    pub profiles: Vec<String>,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// Restart policy applied by the supervisor.
    pub restart: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:80".to_string(),
            upstream: "sql-schema-parser".to_string(),
            profiles: vec!["production".to_string()],
            request_timeout_secs: 30,
            restart: "unless-stopped".to_string(),
        }
    }
}

/// Supervisor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Base delay for restart backoff in milliseconds.
    pub restart_base_delay_ms: u64,

    /// Maximum delay for restart backoff in milliseconds.
    pub restart_max_delay_ms: u64,

    /// Enable the local status endpoint.
    pub status_enabled: bool,

    /// Status endpoint bind address.
    pub status_address: String,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            restart_base_delay_ms: 1_000,
            restart_max_delay_ms: 60_000,
            status_enabled: true,
            status_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Optional directory for the file log sink. Typically a bind-mounted
    /// host path in containerized deployments.
    pub log_dir: Option<String>,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
            metrics_enabled: true,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
