//! # Shared Protocol Library
//!
//! Types that the simulator and the observers must agree on byte for byte:
//! court constants, the entity schema, replicated variables, the command
//! codec and the datagram format.
//!
//! ## Module Organization
//!
//! - `schema`: registry of entity kinds and their ordered, typed fields
//! - `replicated`: change-tracked variables, the unit of synchronization
//! - `entity`: the closed set of entity kinds (`Ball`, `Player`)
//! - `store`: owns entity instances addressed by a stable [`EntityId`]
//! - `intent`: atomically updated movement intent written by the command context
//! - `command`: named command payload codec (`Initialize`, `Move`, `StopMove`)
//! - `protocol`: the bincode datagram enum exchanged over UDP
//! - `replication`: collects the variables that changed since the previous push
//!
//! Both sides build their registry with [`schema::SchemaRegistry::pong`] and
//! create entities in the same order, so entity identifiers line up without
//! any negotiation.

pub mod command;
pub mod entity;
pub mod error;
pub mod intent;
pub mod protocol;
pub mod replicated;
pub mod replication;
pub mod schema;
pub mod store;

use serde::{Deserialize, Serialize};

pub use command::{Direction, Initialize, UserCommand};
pub use entity::{Ball, Entity, Player};
pub use error::SchemaError;
pub use intent::{IntentSnapshot, PlayerIntent};
pub use protocol::{Packet, Value, VariableUpdate};
pub use replicated::Replicated;
pub use replication::ReplicationTracker;
pub use schema::{FieldDef, FieldType, SchemaRegistry};
pub use store::{EntityId, EntityStore};

/// Number of participants a simulator accepts. Not configurable.
pub const PLAYER_COUNT: usize = 2;
pub const PROTOCOL_VERSION: u32 = 1;
pub const DEFAULT_PORT: u16 = 1338;
pub const DEFAULT_TICK_RATE: u32 = 60;

pub const COURT_WIDTH: f32 = 600.0;
pub const COURT_HEIGHT: f32 = 300.0;

pub const PADDLE_WIDTH: f32 = 20.0;
pub const PADDLE_HEIGHT: f32 = 64.0;
/// Paddle travel in units per second while `IsMoving` is set.
pub const PADDLE_SPEED: f32 = 240.0;
/// Paddle centers along X, indexed by participant identifier.
pub const PADDLE_X: [f32; PLAYER_COUNT] = [50.0, 550.0];

pub const BALL_SIZE: f32 = 20.0;
pub const BALL_SPEED: f32 = 200.0;
/// Radians per second of spin applied to a moving ball.
pub const BALL_SPIN: f64 = 3.0;

/// Where the ball is placed after a goal.
pub const COURT_CENTER: Vec2 = Vec2 {
    x: COURT_WIDTH / 2.0,
    y: COURT_HEIGHT / 2.0,
};

/// 2D vector used for positions, sizes and directions.
/// Positive Y is up.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn normalize(&self) -> Vec2 {
        let mag = self.magnitude();
        if mag == 0.0 {
            Vec2::ZERO
        } else {
            Vec2::new(self.x / mag, self.y / mag)
        }
    }

    pub fn scale(&self, scalar: f32) -> Vec2 {
        Vec2::new(self.x * scalar, self.y * scalar)
    }

    pub fn add(&self, other: &Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }
}
