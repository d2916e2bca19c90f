//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! stack manifest (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → StackConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults so a minimal manifest works
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::HealthCheckConfig;
pub use schema::ObservabilityConfig;
pub use schema::ProxyConfig;
pub use schema::RateLimitConfig;
pub use schema::ServiceConfig;
pub use schema::StackConfig;
pub use schema::SupervisorConfig;
