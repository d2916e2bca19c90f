//! Service descriptors.
//!
//! # Responsibilities
//! - Runtime view of a manifest entry: name, address, env, restart
//!   policy, resolved probe spec, profile gate
//! - Reconcile the two probe spec sources into one canonical policy
//!
//! # Design Decisions
//! - Manifest-level health checks override runtime defaults, mirroring
//!   how an orchestration manifest overrides an image HEALTHCHECK
//! - Descriptors are immutable once built; the supervisor owns mutation

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::config::{HealthCheckConfig, ProxyConfig, ServiceConfig};

/// Restart policy applied by the supervisor when a service turns
/// unhealthy or its task exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Restart on failure and on exit.
    Always,
    /// Restart on failure unless the supervisor stopped the service.
    UnlessStopped,
    /// Restart only after a failure.
    OnFailure,
    /// Never restart.
    No,
}

impl RestartPolicy {
    /// Whether an unhealthy service should be restarted.
    pub fn restarts_on_failure(&self) -> bool {
        !matches!(self, RestartPolicy::No)
    }
}

impl FromStr for RestartPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(RestartPolicy::Always),
            "unless-stopped" => Ok(RestartPolicy::UnlessStopped),
            "on-failure" => Ok(RestartPolicy::OnFailure),
            "no" => Ok(RestartPolicy::No),
            other => Err(format!("unknown restart policy '{other}'")),
        }
    }
}

impl std::fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RestartPolicy::Always => "always",
            RestartPolicy::UnlessStopped => "unless-stopped",
            RestartPolicy::OnFailure => "on-failure",
            RestartPolicy::No => "no",
        };
        f.write_str(s)
    }
}

/// Resolved health probe parameters for one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSpec {
    pub interval: Duration,
    pub timeout: Duration,
    pub path: String,
    pub retries: u32,
    pub start_period: Duration,
}

impl ProbeSpec {
    /// Canonical reconciliation of probe specs: the orchestration-level
    /// spec from the manifest wins over the spec baked into the runtime.
    /// Returns `None` when neither side declares one (probing disabled).
    pub fn resolve(
        manifest: Option<&HealthCheckConfig>,
        baked_in: Option<ProbeSpec>,
    ) -> Option<ProbeSpec> {
        match manifest {
            Some(hc) => Some(ProbeSpec::from(hc)),
            None => baked_in,
        }
    }
}

impl From<&HealthCheckConfig> for ProbeSpec {
    fn from(hc: &HealthCheckConfig) -> Self {
        Self {
            interval: Duration::from_secs(hc.interval_secs),
            timeout: Duration::from_secs(hc.timeout_secs),
            path: hc.path.clone(),
            retries: hc.retries,
            start_period: Duration::from_secs(hc.start_period_secs),
        }
    }
}

/// Runtime view of one supervised service.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    /// Unique service name.
    pub name: String,

    /// Address the service binds.
    pub addr: SocketAddr,

    /// Environment variables handed to the runtime at start.
    pub env: BTreeMap<String, String>,

    /// Restart policy.
    pub restart: RestartPolicy,

    /// Resolved probe spec, `None` when probing is disabled.
    pub probe: Option<ProbeSpec>,

    /// Profiles this service is active under. Empty = always active.
    pub profiles: Vec<String>,
}

impl ServiceDescriptor {
    /// Whether this service is instantiated under the given profile.
    pub fn active_under(&self, profile: Option<&str>) -> bool {
        if self.profiles.is_empty() {
            return true;
        }
        match profile {
            Some(p) => self.profiles.iter().any(|candidate| candidate == p),
            None => false,
        }
    }

    /// Build the app-service descriptor from its manifest section.
    /// `baked_in` is the probe spec the runtime ships with.
    pub fn from_service_config(
        config: &ServiceConfig,
        baked_in: Option<ProbeSpec>,
    ) -> Result<Self, String> {
        let addr = config
            .bind_address
            .parse()
            .map_err(|_| format!("invalid bind address '{}'", config.bind_address))?;
        Ok(Self {
            name: config.name.clone(),
            addr,
            env: config.env.clone(),
            restart: config.restart.parse()?,
            probe: ProbeSpec::resolve(config.health_check.as_ref(), baked_in),
            profiles: config.profiles.clone(),
        })
    }

    /// Build the proxy descriptor from its manifest section. The proxy
    /// carries no health check of its own in the source deployment.
    pub fn from_proxy_config(name: &str, config: &ProxyConfig) -> Result<Self, String> {
        let addr = config
            .bind_address
            .parse()
            .map_err(|_| format!("invalid bind address '{}'", config.bind_address))?;
        Ok(Self {
            name: name.to_string(),
            addr,
            env: BTreeMap::new(),
            restart: config.restart.parse()?,
            probe: None,
            profiles: config.profiles.clone(),
        })
    }
}
