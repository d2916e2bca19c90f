//! Reverse proxy subsystem.
//!
//! # Data Flow
//! ```text
//! Client request on the public port
//!     → middleware (timeout, request ID, tracing)
//!     → URI rewritten to the upstream authority
//!     → upstream response streamed back
//! ```
//!
//! Instantiated only under a matching deployment profile; the default
//! stack runs the application service alone.

pub mod server;

pub use server::{ProxyRuntime, ProxyServer};
