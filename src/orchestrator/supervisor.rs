//! Service supervision.
//!
//! # Responsibilities
//! - Create stack members in declaration order under the active profile
//! - Run one supervision loop per service: probe, drive the state
//!   machine, restart per policy
//! - Own all orchestration state (creation order, restart counts);
//!   none of it lives in application code
//!
//! # Design Decisions
//! - The proxy is created after the application service. Creation is
//!   the only gate: a created upstream is not necessarily healthy yet,
//!   and there is no wait-for-healthy step before the proxy starts
//! - One restart per unhealthy episode; consecutive restarts back off
//!   exponentially, and the streak resets once the service is healthy
//! - Replacement instances get a fresh start period

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::StackConfig;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::orchestrator::descriptor::ServiceDescriptor;
use crate::orchestrator::probe::HealthProber;
use crate::orchestrator::runtime::{RunningService, ServiceRuntime, SpawnError, StartContext};
use crate::orchestrator::state::{HealthStateMachine, ServiceState};
use crate::orchestrator::status::StatusRegistry;
use crate::proxy::ProxyRuntime;
use crate::service::AppRuntime;

/// Name under which the reverse proxy appears in status and logs.
pub const PROXY_SERVICE_NAME: &str = "reverse-proxy";

/// Error bringing the stack up.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("invalid service descriptor: {0}")]
    Descriptor(String),

    #[error(transparent)]
    Spawn(#[from] SpawnError),
}

/// One supervised stack member: its descriptor plus the runtime that
/// creates instances of it.
pub struct SupervisedUnit {
    pub descriptor: ServiceDescriptor,
    pub runtime: Arc<dyn ServiceRuntime>,
}

/// Supervises the stack: the application service and, under the right
/// profile, the reverse proxy in front of it.
pub struct Supervisor {
    units: Vec<SupervisedUnit>,
    registry: StatusRegistry,
    profile: Option<String>,
    restart_base_delay_ms: u64,
    restart_max_delay_ms: u64,
    status_enabled: bool,
    status_address: String,
}

impl Supervisor {
    /// Build the supervisor from a validated manifest and the active
    /// deployment profile.
    pub fn from_config(config: &StackConfig, profile: Option<String>) -> Result<Self, SupervisorError> {
        let app_runtime = Arc::new(AppRuntime::new(config.service.clone()));
        let app_descriptor =
            ServiceDescriptor::from_service_config(&config.service, app_runtime.baked_in_probe())
                .map_err(SupervisorError::Descriptor)?;

        let proxy_runtime = Arc::new(ProxyRuntime::new(config.proxy.clone(), app_descriptor.addr));
        let proxy_descriptor = ServiceDescriptor::from_proxy_config(PROXY_SERVICE_NAME, &config.proxy)
            .map_err(SupervisorError::Descriptor)?;

        // Declaration order is creation order: the proxy depends on the
        // application service already existing.
        let units = vec![
            SupervisedUnit {
                descriptor: app_descriptor,
                runtime: app_runtime,
            },
            SupervisedUnit {
                descriptor: proxy_descriptor,
                runtime: proxy_runtime,
            },
        ];

        Ok(Self::new(units, &config.supervisor, profile))
    }

    /// Build a supervisor over an explicit set of units. `from_config`
    /// is the common entry point; this one exists for embedding other
    /// runtimes.
    pub fn new(
        units: Vec<SupervisedUnit>,
        config: &crate::config::SupervisorConfig,
        profile: Option<String>,
    ) -> Self {
        Self {
            units,
            registry: StatusRegistry::new(),
            profile,
            restart_base_delay_ms: config.restart_base_delay_ms,
            restart_max_delay_ms: config.restart_max_delay_ms,
            status_enabled: config.status_enabled,
            status_address: config.status_address.clone(),
        }
    }

    /// Status registry handle, shared with the status endpoint.
    pub fn registry(&self) -> StatusRegistry {
        self.registry.clone()
    }

    /// Bring the stack up and supervise it until shutdown.
    pub async fn run(self, shutdown: Shutdown) -> Result<(), SupervisorError> {
        let mut shutdown_rx = shutdown.subscribe();

        if self.status_enabled {
            if let Ok(addr) = self.status_address.parse() {
                let registry = self.registry.clone();
                let rx = shutdown.subscribe();
                tokio::spawn(async move {
                    if let Err(e) = crate::orchestrator::status::serve_status(addr, registry, rx).await {
                        tracing::error!(error = %e, "Status endpoint failed");
                    }
                });
            }
        }

        let mut supervision_tasks: Vec<JoinHandle<()>> = Vec::new();

        for unit in self.units {
            if !unit.descriptor.active_under(self.profile.as_deref()) {
                tracing::info!(
                    service = %unit.descriptor.name,
                    profile = ?self.profile,
                    "Service not active under profile, skipping"
                );
                continue;
            }

            let name = unit.descriptor.name.clone();
            let running = match unit.runtime.start(
                &name,
                unit.descriptor.addr,
                StartContext {
                    env: unit.descriptor.env.clone(),
                    shutdown: shutdown.subscribe(),
                },
            ) {
                Ok(running) => running,
                Err(e) => {
                    // Fatal and operator-visible: tear down whatever was
                    // already created and surface the error.
                    tracing::error!(service = %name, error = %e, "Failed to create service");
                    shutdown.trigger();
                    for task in supervision_tasks {
                        let _ = task.await;
                    }
                    return Err(e.into());
                }
            };

            self.registry.record_created(&name, running.addr);
            tracing::info!(service = %name, address = %running.addr, "Service created");

            supervision_tasks.push(tokio::spawn(supervise(
                unit.descriptor,
                unit.runtime,
                running,
                self.registry.clone(),
                self.restart_base_delay_ms,
                self.restart_max_delay_ms,
                shutdown.clone(),
            )));
        }

        if !shutdown.is_triggered() {
            let _ = shutdown_rx.recv().await;
        }

        for task in supervision_tasks {
            let _ = task.await;
        }

        tracing::info!("Supervisor stopped");
        Ok(())
    }
}

/// Supervision loop for one service: probe on the configured interval,
/// feed the state machine, restart per policy.
async fn supervise(
    descriptor: ServiceDescriptor,
    runtime: Arc<dyn ServiceRuntime>,
    mut running: RunningService,
    registry: StatusRegistry,
    restart_base_delay_ms: u64,
    restart_max_delay_ms: u64,
    shutdown: Shutdown,
) {
    let name = descriptor.name.clone();
    let mut shutdown_rx = shutdown.subscribe();

    let Some(spec) = descriptor.probe.clone() else {
        // No probe declared: the service counts as healthy once created.
        registry.set_state(&name, ServiceState::Healthy);
        if !shutdown.is_triggered() {
            let _ = shutdown_rx.recv().await;
        }
        registry.set_state(&name, ServiceState::Stopped);
        let _ = running.task.await;
        return;
    };

    let prober = HealthProber::new(&name, descriptor.addr, &spec);
    let mut machine = HealthStateMachine::new(spec.retries, spec.start_period, Instant::now());
    let mut ticker = time::interval(spec.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut restart_streak: u32 = 0;

    if shutdown.is_triggered() {
        registry.set_state(&name, ServiceState::Stopped);
        let _ = running.task.await;
        return;
    }

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let healthy = prober.probe_once().await;
                metrics::record_probe(&name, healthy);
                registry.record_probe(&name, healthy);

                let transition = if healthy {
                    machine.on_probe_success()
                } else {
                    machine.on_probe_failure(Instant::now())
                };

                let Some(new_state) = transition else { continue };
                tracing::info!(service = %name, state = %new_state, "Service state changed");
                registry.set_state(&name, new_state);

                match new_state {
                    ServiceState::Healthy => {
                        restart_streak = 0;
                    }
                    ServiceState::Unhealthy if descriptor.restart.restarts_on_failure() => {
                        if let Some(state) = machine.on_restart_scheduled() {
                            registry.set_state(&name, state);
                        }
                        restart_streak += 1;
                        let delay = crate::resilience::restart_backoff(
                            restart_streak,
                            restart_base_delay_ms,
                            restart_max_delay_ms,
                        );
                        tracing::warn!(
                            service = %name,
                            attempt = restart_streak,
                            delay_ms = delay.as_millis() as u64,
                            "Restarting unhealthy service"
                        );

                        // Drop the failed instance first so its port is
                        // free for the replacement.
                        running.task.abort();
                        let _ = (&mut running.task).await;

                        tokio::select! {
                            _ = time::sleep(delay) => {}
                            _ = shutdown_rx.recv() => {
                                machine.on_stopped();
                                registry.set_state(&name, ServiceState::Stopped);
                                return;
                            }
                        }

                        match runtime.start(
                            &name,
                            descriptor.addr,
                            StartContext {
                                env: descriptor.env.clone(),
                                shutdown: shutdown.subscribe(),
                            },
                        ) {
                            Ok(replacement) => {
                                running = replacement;
                                metrics::record_restart(&name);
                                registry.record_restart(&name);
                                if let Some(state) = machine.on_restarted(Instant::now()) {
                                    registry.set_state(&name, state);
                                }
                                tracing::info!(service = %name, "Service restarted");
                                ticker.reset();
                            }
                            Err(e) => {
                                tracing::error!(service = %name, error = %e, "Failed to respawn service");
                                machine.on_stopped();
                                registry.set_state(&name, ServiceState::Stopped);
                                return;
                            }
                        }
                    }
                    ServiceState::Unhealthy => {
                        tracing::warn!(
                            service = %name,
                            policy = %descriptor.restart,
                            "Service unhealthy, restart disabled by policy"
                        );
                    }
                    _ => {}
                }
            }
            _ = shutdown_rx.recv() => {
                machine.on_stopped();
                registry.set_state(&name, ServiceState::Stopped);
                break;
            }
        }
    }

    // The instance received the same broadcast; wait for its drain.
    let _ = running.task.await;
}
