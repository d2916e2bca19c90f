//! Resilience primitives.
//!
//! # Design Decisions
//! - Restart scheduling backs off exponentially so an instance that
//!   fails right after replacement cannot produce a tight crash loop
//! - Jittered delays prevent synchronized restarts

pub mod backoff;

pub use backoff::restart_backoff;
