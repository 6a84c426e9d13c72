//! Movement intent shared between the command context and the simulation thread.
//!
//! `MovementDirection` and `IsMoving` are packed into one byte so that a single
//! atomic load always yields a consistent pair. The command context is the
//! only writer; the simulation thread is the only reader.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::command::Direction;

const MOVING: u8 = 0b01;
const DOWN: u8 = 0b10;

/// Non-replicated, simulation-local player state written from network callbacks.
#[derive(Debug, Default)]
pub struct PlayerIntent {
    bits: AtomicU8,
}

/// One consistent read of a player's intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentSnapshot {
    pub direction: Direction,
    pub moving: bool,
}

impl PlayerIntent {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Move(direction)`: sets the direction and raises the moving flag in one store.
    pub fn start(&self, direction: Direction) {
        let bits = match direction {
            Direction::Up => MOVING,
            Direction::Down => MOVING | DOWN,
        };
        self.bits.store(bits, Ordering::Release);
    }

    /// `StopMove`: clears the moving flag, keeping the last direction.
    pub fn stop(&self) {
        self.bits.fetch_and(!MOVING, Ordering::AcqRel);
    }

    pub fn snapshot(&self) -> IntentSnapshot {
        let bits = self.bits.load(Ordering::Acquire);
        IntentSnapshot {
            direction: if bits & DOWN != 0 {
                Direction::Down
            } else {
                Direction::Up
            },
            moving: bits & MOVING != 0,
        }
    }
}
