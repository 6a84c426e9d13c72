use clap::Parser;
use client::{InputTracker, Observer, ObserverConfig};
use log::{info, warn};
use server::{host, ServerConfig, ServerHandle};
use shared::{Direction, DEFAULT_PORT};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::interval;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Simulator address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1")]
    server: String,

    /// Simulator port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// How long to wait for the handshake, in milliseconds
    #[arg(long, default_value = "2000")]
    timeout_ms: u64,

    /// Host a simulator in-process if joining fails
    #[arg(long)]
    host_fallback: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let address = format!("{}:{}", args.server, args.port);
    let config = ObserverConfig {
        join_timeout: Duration::from_millis(args.timeout_ms),
        ..ObserverConfig::new(address.clone())
    };

    info!("Starting client...");
    let (observer, hosted) = match Observer::join(config.clone()).await {
        Ok(observer) => (observer, None),
        Err(e) if args.host_fallback => {
            warn!("Could not join {} ({}); hosting instead", address, e);
            let handle = host(ServerConfig {
                bind_addr: address,
                ..ServerConfig::default()
            })
            .await?;
            let config = ObserverConfig {
                server_addr: handle.local_addr().to_string(),
                ..config
            };
            (Observer::join(config).await?, Some(handle))
        }
        Err(e) => return Err(e.into()),
    };

    info!("Playing as participant {}", observer.user_id());
    info!("Controls: type up / down / stop, then Enter; quit to leave");

    let result = play(&observer).await;

    observer.leave().await;
    shutdown(hosted).await?;
    result
}

/// Reads commands from stdin and reports the mirrored court until quit.
async fn play(observer: &Observer) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut input = InputTracker::new();
    let mut report = interval(Duration::from_millis(500));
    let mirror = observer.mirror();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let wanted = match line?.as_deref().map(str::trim) {
                    Some("up") => Some(Direction::Up),
                    Some("down") => Some(Direction::Down),
                    Some("stop") => None,
                    Some("quit") | None => return Ok(()),
                    Some(other) => {
                        warn!("Unknown command `{}`", other);
                        continue;
                    }
                };
                if let Some(command) = input.set(wanted) {
                    observer.send_command(command).await?;
                }
            },

            _ = report.tick() => {
                if !observer.is_connected() {
                    warn!("Connection closed by simulator");
                    return Ok(());
                }
                let mirror = mirror.read().await;
                if let (Some(paddle), Some(ball)) = (mirror.player(observer.user_id()), mirror.ball()) {
                    info!(
                        "tick {}: paddle {:?}, ball {:?} (rotation {:.2})",
                        mirror.last_tick(),
                        paddle.position.get(),
                        ball.position.get(),
                        ball.rotation.get()
                    );
                }
            },

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, leaving...");
                return Ok(());
            }
        }
    }
}

async fn shutdown(hosted: Option<ServerHandle>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(handle) = hosted {
        handle.shutdown().await?;
    }
    Ok(())
}
