use clap::Parser;
use log::{error, info};
use server::{host, ServerConfig};
use shared::{DEFAULT_PORT, DEFAULT_TICK_RATE};
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Tick rate (updates per second)
    #[clap(short, long, default_value_t = DEFAULT_TICK_RATE)]
    tick_rate: u32,
    /// Seconds of silence before a participant is dropped
    #[clap(long, default_value = "5")]
    timeout_secs: u64,
    /// Seed for the serve angle after a goal
    #[clap(long, default_value = "0")]
    seed: u64,
}

/// Parses command-line arguments, hosts until Ctrl+C, then shuts down.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        tick_rate: args.tick_rate,
        client_timeout: Duration::from_secs(args.timeout_secs),
        seed: args.seed,
        ..ServerConfig::default()
    };

    let handle = match host(config).await {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to start server: {}", e);
            return Err(e.into());
        }
    };

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down gracefully...");

    handle.shutdown().await?;
    Ok(())
}
