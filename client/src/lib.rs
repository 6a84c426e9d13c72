//! # Pong Observer Library
//!
//! This library is the observer side of the Pong replication protocol. An
//! observer joins a simulator, learns which paddle it owns, mirrors every
//! replicated field the simulator pushes, and sends movement commands on
//! input edges.
//!
//! ## Architecture Overview
//!
//! The observer never simulates. It displays exactly the last authoritative
//! values it received; there is no prediction, interpolation or rollback.
//!
//! ### Joining
//! [`Observer::join`] sends `Connect` with the schema fingerprint and blocks,
//! up to a caller-supplied timeout, until the simulator's `Initialize`
//! arrives. A join ends in one of:
//! - `Ok`, with the participant identifier in `[0, 2)`
//! - [`JoinError::Timeout`] when `Initialize` never arrives or was too short
//! - [`JoinError::InvalidIdentity`] when the identifier is out of range
//! - [`JoinError::Rejected`] when the simulator is full or the schema differs
//!
//! A failed join is torn down before the error is returned, so the caller can
//! retry or host a simulator itself.
//!
//! ### Mirroring
//! The [`Mirror`] holds the same Ball and Player instances as the simulator,
//! created in the same order so identifiers line up. Pushes overwrite fields
//! by `(entity, field)`; a stale datagram never rolls a field back.
//!
//! ### Commands
//! [`InputTracker`] turns held-key state into `Move`/`StopMove` only when the
//! state changes. The simulator keeps a paddle moving until `StopMove`.
//!
//! ## Module Organization
//!
//! ### Handshake Module (`handshake`)
//! The `Unauthenticated -> Initialized -> Disconnected` state machine and the
//! bounded join waiter.
//!
//! ### Mirror Module (`mirror`)
//! Read-only entity store fed by replication pushes.
//!
//! ### Input Module (`input`)
//! Edge detection for paddle controls.
//!
//! ### Network Module (`network`)
//! UDP socket, receive task and heartbeat task.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::{InputTracker, Observer, ObserverConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let observer = Observer::join(ObserverConfig::new("127.0.0.1:1338")).await?;
//!     let mut input = InputTracker::new();
//!
//!     // Up pressed
//!     if let Some(command) = input.update(true, false) {
//!         observer.send_command(command).await?;
//!     }
//!
//!     let mirror = observer.mirror();
//!     if let Some(paddle) = mirror.read().await.player(observer.user_id()) {
//!         println!("Paddle at {:?}", paddle.position.get());
//!     }
//!
//!     observer.leave().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod handshake;
pub mod input;
pub mod mirror;
pub mod network;

pub use config::ObserverConfig;
pub use error::JoinError;
pub use handshake::{Handshake, HandshakeState};
pub use input::InputTracker;
pub use mirror::Mirror;
pub use network::Observer;
