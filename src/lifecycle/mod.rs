//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load manifest → Validate → Init observability → Supervisor::run
//!
//! Shutdown (shutdown.rs):
//!     Trigger → services drain → supervision loops exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//!     second signal → forced exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then observability, then services
//! - Stopping a service is a broadcast, not an abort; hard aborts are
//!   reserved for unhealthy replacements

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
