use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use schema_stack::config::{loader, StackConfig};
use schema_stack::lifecycle::{signals, Shutdown};
use schema_stack::observability::{logging, metrics};
use schema_stack::Supervisor;

#[derive(Parser)]
#[command(name = "schema-stack")]
#[command(about = "Supervisor for the schema-parser service stack", long_about = None)]
struct Cli {
    /// Path to the stack manifest.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Active deployment profile (e.g. "production").
    #[arg(short, long, env = "STACK_PROFILE")]
    profile: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match loader::load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("schema-stack: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => StackConfig::default(),
    };

    if let Err(e) = logging::init_logging(&config.observability) {
        eprintln!("schema-stack: failed to open log file: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        profile = cli.profile.as_deref().unwrap_or("(none)"),
        "schema-stack starting"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let supervisor = match Supervisor::from_config(&config, cli.profile) {
        Ok(supervisor) => supervisor,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build supervisor");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    match supervisor.run(shutdown).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Stack failed");
            ExitCode::FAILURE
        }
    }
}
