//! Input edge detection: held keys in, `Move`/`StopMove` commands out

use shared::{Direction, UserCommand};

/// Turns sampled key state into commands, emitting one only on a transition.
///
/// The simulator treats a `Move` as sticky until `StopMove`, so resending it
/// every frame is unnecessary.
#[derive(Debug, Default)]
pub struct InputTracker {
    // Previous frame state for edge detection
    held: Option<Direction>,
}

impl InputTracker {
    pub fn new() -> Self {
        Self { held: None }
    }

    /// Samples the up/down keys. Both or neither held means no movement.
    pub fn update(&mut self, up: bool, down: bool) -> Option<UserCommand> {
        let wanted = match (up, down) {
            (true, false) => Some(Direction::Up),
            (false, true) => Some(Direction::Down),
            _ => None,
        };
        self.set(wanted)
    }

    /// Sets the held direction directly, returning the command for the edge if any.
    pub fn set(&mut self, wanted: Option<Direction>) -> Option<UserCommand> {
        if wanted == self.held {
            return None;
        }
        self.held = wanted;

        Some(match wanted {
            Some(direction) => UserCommand::Move(direction),
            None => UserCommand::StopMove,
        })
    }

    pub fn held(&self) -> Option<Direction> {
        self.held
    }
}
