//! Named command codec.
//!
//! | Direction | Name | Payload |
//! |---|---|---|
//! | simulator → observer | `Initialize` | `i32`, little-endian |
//! | observer → simulator | `Move` | 1 byte: 0 = Up, 1 = Down |
//! | observer → simulator | `StopMove` | none |
//!
//! Decoders return `None` for anything short or out of range; callers drop
//! such messages without answering.

use crate::protocol::Packet;

pub const INITIALIZE: &str = "Initialize";
pub const MOVE: &str = "Move";
pub const STOP_MOVE: &str = "StopMove";

/// Paddle movement direction. Up moves toward +Y.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn to_byte(self) -> u8 {
        match self {
            Direction::Up => 0,
            Direction::Down => 1,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Direction> {
        match byte {
            0 => Some(Direction::Up),
            1 => Some(Direction::Down),
            _ => None,
        }
    }

    /// Sign applied to Y displacement.
    pub fn sign(self) -> f32 {
        match self {
            Direction::Up => 1.0,
            Direction::Down => -1.0,
        }
    }
}

/// Commands an observer sends to the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    Move(Direction),
    StopMove,
}

impl UserCommand {
    pub fn name(&self) -> &'static str {
        match self {
            UserCommand::Move(_) => MOVE,
            UserCommand::StopMove => STOP_MOVE,
        }
    }

    pub fn payload(&self) -> Vec<u8> {
        match self {
            UserCommand::Move(direction) => vec![direction.to_byte()],
            UserCommand::StopMove => Vec::new(),
        }
    }

    pub fn decode(name: &str, payload: &[u8]) -> Option<UserCommand> {
        match name {
            MOVE => payload
                .first()
                .and_then(|byte| Direction::from_byte(*byte))
                .map(UserCommand::Move),
            STOP_MOVE => Some(UserCommand::StopMove),
            _ => None,
        }
    }

    pub fn to_packet(&self) -> Packet {
        Packet::UserMessage {
            name: self.name().to_string(),
            payload: self.payload(),
        }
    }
}

/// The handshake command carrying the assigned participant identifier.
///
/// The identifier travels as a signed 32-bit integer; range checking is left
/// to the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Initialize {
    pub user_id: i32,
}

impl Initialize {
    pub const PAYLOAD_LEN: usize = 4;

    pub fn payload(&self) -> Vec<u8> {
        self.user_id.to_le_bytes().to_vec()
    }

    pub fn decode(payload: &[u8]) -> Option<Initialize> {
        let bytes: [u8; Self::PAYLOAD_LEN] = payload.get(..Self::PAYLOAD_LEN)?.try_into().ok()?;
        Some(Initialize {
            user_id: i32::from_le_bytes(bytes),
        })
    }

    pub fn to_packet(&self) -> Packet {
        Packet::HostMessage {
            name: INITIALIZE.to_string(),
            payload: self.payload(),
        }
    }
}
