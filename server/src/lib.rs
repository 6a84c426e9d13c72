//! # Pong Simulator Library
//!
//! This library hosts the authoritative side of the two-player Pong
//! replication protocol. It owns the canonical entity store, runs the
//! physics at a fixed timestep, and pushes every changed replicated field to
//! the connected observers.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! One ball and two paddles live in an [`shared::EntityStore`]. Every tick
//! the simulation thread steps physics, moves paddles whose owner is holding
//! a direction, resets the ball on a goal, and collects the fields that were
//! written since the last push.
//!
//! ### Participant Management
//! Handles the lifecycle of the (at most two) observers:
//! - Identifier assignment on connect, lowest free slot first
//! - The `Initialize` handshake, sent before any push reaches the observer
//! - Heartbeat tracking and timeout removal
//! - Rejection with `"Server full"` once both slots are taken
//!
//! ### Command Intake
//! `Move` and `StopMove` arrive as named commands on the network context. They
//! only write the sender's intent word; the simulation thread reads it once per
//! tick. Commands from unknown senders or with malformed payloads are dropped.
//!
//! ## Architecture Design
//!
//! ### Two Execution Contexts
//! The simulation runs on a dedicated OS thread driven by a fixed-timestep
//! accumulator. Networking runs as tokio tasks. The only state shared between
//! them is the per-player intent (one atomic byte each), the resync flag, and
//! the channel carrying finished pushes to the sender task.
//!
//! ### UDP-Based Communication
//! Every datagram is one bincode-encoded [`shared::Packet`]. Pushes are not
//! acknowledged; a lost push is superseded by the next one for moving fields
//! and by the full push that follows each join.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Participant slots, handshake state and inactivity timeouts.
//!
//! ### Commands Module (`commands`)
//! Decodes `Move`/`StopMove` and writes the sender's intent.
//!
//! ### Game Module (`game`)
//! The [`game::Simulator`] and the fixed-rate [`game::run_simulation`] loop.
//!
//! ### Network Module (`network`)
//! Socket tasks (receiver, sender, timeout checker) and packet handling.
//!
//! ### Physics Module (`physics`)
//! The [`physics::Physics`] contract and the box-vs-box [`physics::ArcadePhysics`] world.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::{host, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handle = host(ServerConfig::default()).await?;
//!     println!("Hosting on {}", handle.local_addr());
//!
//!     tokio::signal::ctrl_c().await?;
//!     handle.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod commands;
pub mod config;
pub mod error;
pub mod game;
pub mod network;
pub mod physics;
pub mod timestep;

pub use config::ServerConfig;
pub use error::ServerError;

use commands::CommandHandler;
use game::{run_simulation, SimulationConfig, Simulator};
use log::{error, info};
use network::{GameMessage, NetworkServer, ServerMessage};
use shared::Packet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use timestep::FixedTimestep;
use tokio::sync::mpsc;

/// A running host: the simulation thread plus the network tasks.
///
/// Dropping the handle asks both contexts to stop without waiting for them;
/// [`ServerHandle::shutdown`] also joins them.
pub struct ServerHandle {
    local_addr: SocketAddr,
    stop: Arc<AtomicBool>,
    control: mpsc::UnboundedSender<ServerMessage>,
    simulation: Option<thread::JoinHandle<()>>,
    network: Option<tokio::task::JoinHandle<()>>,
}

impl ServerHandle {
    /// Address the host is actually listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.simulation
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the simulation after its current tick, then stops networking.
    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        self.stop.store(true, Ordering::Release);

        let panicked = match self.simulation.take() {
            Some(handle) => tokio::task::spawn_blocking(move || handle.join().is_err())
                .await
                .unwrap_or(true),
            None => false,
        };

        let _ = self.control.send(ServerMessage::Shutdown);
        if let Some(network) = self.network.take() {
            if let Err(e) = network.await {
                error!("Network task failed: {}", e);
            }
        }

        info!("Host on {} stopped", self.local_addr);
        if panicked {
            Err(ServerError::SimulationPanicked)
        } else {
            Ok(())
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        let _ = self.control.send(ServerMessage::Shutdown);
    }
}

/// Starts hosting: binds the socket, builds the world and spawns both
/// execution contexts. Must be called inside a tokio runtime.
pub async fn host(config: ServerConfig) -> Result<ServerHandle, ServerError> {
    let simulator = Simulator::new(SimulationConfig {
        step: config.tick_duration().as_secs_f32(),
        serve_angle_jitter: config.serve_angle_jitter,
        seed: config.seed,
    })?;
    let fingerprint = simulator.store().registry().fingerprint();

    let mut network = NetworkServer::bind(
        &config.bind_addr,
        CommandHandler::new(simulator.intents()),
        simulator.resync_flag(),
        fingerprint,
        config.client_timeout,
    )
    .await?;
    let local_addr = network.local_addr()?;
    let pushes = network.game_sender();
    let control = network.control_sender();

    let stop = Arc::new(AtomicBool::new(false));
    let clock = FixedTimestep::new(config.tick_duration(), config.max_frame_time);
    let simulation = {
        let stop = Arc::clone(&stop);
        thread::Builder::new()
            .name("simulation".to_string())
            .spawn(move || {
                run_simulation(simulator, clock, stop, |report| {
                    if report.updates.is_empty() {
                        return;
                    }
                    let packet = Packet::Replicate {
                        tick: report.tick,
                        updates: report.updates,
                    };
                    if pushes.send(GameMessage::Broadcast { packet }).is_err() {
                        error!("Network sender closed; dropping push");
                    }
                });
            })?
    };

    let network = tokio::spawn(async move { network.run().await });

    info!(
        "Hosting on {} at {}Hz (timeout {:?})",
        local_addr, config.tick_rate, config.client_timeout
    );

    Ok(ServerHandle {
        local_addr,
        stop,
        control,
        simulation: Some(simulation),
        network: Some(network),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn local_config() -> ServerConfig {
        ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_host_binds_ephemeral_port() {
        let handle = host(local_config()).await.unwrap();
        assert_ne!(handle.local_addr().port(), 0);
        assert!(handle.is_running());
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_host_fails_on_taken_port() {
        let first = host(local_config()).await.unwrap();
        let config = ServerConfig {
            bind_addr: first.local_addr().to_string(),
            ..ServerConfig::default()
        };

        assert!(matches!(host(config).await, Err(ServerError::Bind { .. })));
        first.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_completes_promptly() {
        let handle = host(local_config()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        tokio::time::timeout(Duration::from_secs(2), handle.shutdown())
            .await
            .expect("shutdown finishes")
            .unwrap();
    }
}
