//! Service stack supervisor.
//!
//! Runs the schema-parser application service and, under the production
//! profile, a reverse proxy in front of it. An explicit orchestrator
//! owns health probing, the service state machine, and restart policy;
//! the services themselves only expose the health contract.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌────────────────────────────────────────────────┐
//!                  │                  SUPERVISOR                     │
//!                  │                                                 │
//!   Client ────────┼─▶ proxy (:80, production only) ──▶ service     │
//!                  │                                    (:8000)      │
//!                  │                                                 │
//!                  │   probe loop ──▶ GET /v1/health ──▶ state       │
//!                  │   machine {starting → healthy → unhealthy →     │
//!                  │   restarting} ──▶ restart per policy            │
//!                  │                                                 │
//!                  │   Cross-cutting: config, lifecycle,             │
//!                  │   observability, resilience                     │
//!                  └────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod orchestrator;
pub mod proxy;
pub mod service;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::StackConfig;
pub use lifecycle::Shutdown;
pub use orchestrator::Supervisor;
