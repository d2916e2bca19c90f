//! The application service subsystem.
//!
//! # Data Flow
//! ```text
//! Request
//!     → middleware (request ID, CORS, rate limit, tracking)
//!     → handlers (health, banner, fallback)
//!
//! Shutdown signal
//!     → readiness cleared (probes see 503)
//!     → drain grace
//!     → listener stops
//! ```
//!
//! # Design Decisions
//! - The health endpoint never performs I/O; it reads one atomic flag
//! - Readiness degrades before the listener closes, in that order

pub mod rate_limit;
pub mod readiness;
pub mod server;

pub use readiness::Readiness;
pub use server::{AppRuntime, AppServer};
