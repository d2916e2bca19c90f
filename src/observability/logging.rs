//! Logging initialization.
//!
//! # Responsibilities
//! - Install the tracing subscriber with an env-filter
//! - Attach the optional file sink for the mounted log directory
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level
//! - The file sink is additive: stdout logging always stays on

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::ObservabilityConfig;

/// Initialize the global tracing subscriber from config.
///
/// Returns an error only when the log directory is configured but the
/// log file cannot be opened; a deployment that mounts a log path
/// expects writes there to work.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), std::io::Error> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("schema_stack={}", config.log_level)));

    let stdout_layer = tracing_subscriber::fmt::layer();

    let file_layer = match &config.log_dir {
        Some(dir) => {
            let path = Path::new(dir).join("schema-stack.log");
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file))
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(())
}
