//! Service health state machine.
//!
//! # States
//! ```text
//! Starting → Healthy:    first probe success
//! Starting → Unhealthy:  consecutive failures >= retries, after the
//!                        start period has elapsed
//! Healthy → Unhealthy:   consecutive failures >= retries
//! Unhealthy → Healthy:   probe success before a restart kicks in
//! Unhealthy → Restarting: supervisor schedules a restart
//! Restarting → Starting: new instance spawned
//! any → Stopped:         supervisor shutdown
//! ```
//!
//! # Design Decisions
//! - Probe failures inside the start period never count toward the
//!   retry threshold
//! - Counters reset on every state transition
//! - The machine is pure: callers supply timestamps, the supervisor
//!   owns side effects (restarts, logging, metrics)

use std::time::{Duration, Instant};

/// Orchestrator-visible lifecycle state of one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Created, not yet observed healthy. Probe failures are forgiven
    /// until the start period elapses.
    Starting,
    /// Probes succeeding.
    Healthy,
    /// Retry threshold exceeded; a restart decision is pending.
    Unhealthy,
    /// Supervisor is replacing the instance.
    Restarting,
    /// Shut down by the supervisor. Terminal.
    Stopped,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Starting => "starting",
            ServiceState::Healthy => "healthy",
            ServiceState::Unhealthy => "unhealthy",
            ServiceState::Restarting => "restarting",
            ServiceState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State machine tracking probe outcomes for a single service.
#[derive(Debug)]
pub struct HealthStateMachine {
    state: ServiceState,
    consecutive_failures: u32,
    retries: u32,
    start_period: Duration,
    started_at: Instant,
}

impl HealthStateMachine {
    pub fn new(retries: u32, start_period: Duration, now: Instant) -> Self {
        Self {
            state: ServiceState::Starting,
            consecutive_failures: 0,
            retries,
            start_period,
            started_at: now,
        }
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// True while probe failures are forgiven.
    pub fn in_start_period(&self, now: Instant) -> bool {
        now.duration_since(self.started_at) < self.start_period
    }

    /// Record a successful probe. Returns the new state on transition.
    pub fn on_probe_success(&mut self) -> Option<ServiceState> {
        self.consecutive_failures = 0;
        match self.state {
            ServiceState::Starting | ServiceState::Unhealthy => {
                self.state = ServiceState::Healthy;
                Some(ServiceState::Healthy)
            }
            _ => None,
        }
    }

    /// Record a failed probe. Returns the new state on transition.
    pub fn on_probe_failure(&mut self, now: Instant) -> Option<ServiceState> {
        match self.state {
            ServiceState::Starting if self.in_start_period(now) => {
                // Forgiven: the service is still warming up.
                return None;
            }
            ServiceState::Starting | ServiceState::Healthy => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.retries {
                    self.consecutive_failures = 0;
                    self.state = ServiceState::Unhealthy;
                    return Some(ServiceState::Unhealthy);
                }
                None
            }
            _ => None,
        }
    }

    /// The supervisor decided to replace the instance.
    pub fn on_restart_scheduled(&mut self) -> Option<ServiceState> {
        if self.state == ServiceState::Unhealthy {
            self.consecutive_failures = 0;
            self.state = ServiceState::Restarting;
            Some(ServiceState::Restarting)
        } else {
            None
        }
    }

    /// A replacement instance is up; the start period begins anew.
    pub fn on_restarted(&mut self, now: Instant) -> Option<ServiceState> {
        if self.state == ServiceState::Restarting {
            self.consecutive_failures = 0;
            self.started_at = now;
            self.state = ServiceState::Starting;
            Some(ServiceState::Starting)
        } else {
            None
        }
    }

    /// Terminal: the supervisor is shutting the service down.
    pub fn on_stopped(&mut self) -> Option<ServiceState> {
        if self.state == ServiceState::Stopped {
            None
        } else {
            self.state = ServiceState::Stopped;
            Some(ServiceState::Stopped)
        }
    }
}
