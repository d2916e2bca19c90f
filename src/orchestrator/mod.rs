//! Orchestration subsystem.
//!
//! # Data Flow
//! ```text
//! Manifest + runtimes
//!     → descriptor.rs (resolved probe spec, restart policy)
//!     → supervisor.rs (create in order, one loop per service)
//!
//! Probe loop (probe.rs):
//!     Periodic timer
//!     → GET health path
//!     → state.rs transition
//!     → restart per policy (supervisor.rs)
//!
//! State machine (state.rs):
//!     Starting → Healthy → Unhealthy → Restarting → Starting
//! ```
//!
//! # Design Decisions
//! - Orchestration state (health, restart counts, creation order) is
//!   owned here, never by application code
//! - The manifest-level health check overrides the runtime's baked-in
//!   spec; one canonical policy is in force per service
//! - Probe failures during the start period are forgiven

pub mod descriptor;
pub mod probe;
pub mod runtime;
pub mod state;
pub mod status;
pub mod supervisor;

pub use descriptor::{ProbeSpec, RestartPolicy, ServiceDescriptor};
pub use runtime::{RunningService, ServiceRuntime, SpawnError, StartContext};
pub use state::{HealthStateMachine, ServiceState};
pub use status::{ServiceStatus, StatusRegistry};
pub use supervisor::{SupervisedUnit, Supervisor, SupervisorError, PROXY_SERVICE_NAME};
