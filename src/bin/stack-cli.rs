use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "stack-cli")]
#[command(about = "Operator CLI for the schema-stack supervisor", long_about = None)]
struct Cli {
    /// Supervisor status endpoint.
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every supervised service: state, creation order, restarts
    Status,
    /// Probe the application service's health endpoint directly
    Health {
        /// Base URL of the application service.
        #[arg(short, long, default_value = "http://localhost:8000")]
        service_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Status => {
            let res = client
                .get(format!("{}/status", cli.url))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Health { service_url } => {
            let res = client
                .get(format!("{}/v1/health", service_url))
                .send()
                .await?;
            let status = res.status();
            print_response(res).await?;
            if !status.is_success() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() && !status.is_server_error() {
        eprintln!("Error: endpoint returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
