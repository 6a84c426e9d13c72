//! Command dispatch in the network-callback context.
//!
//! Handlers write only the per-player intent word. They never read or write
//! `Position`, `Rotation` or `Size`; those belong to the simulation thread.

use log::debug;
use shared::{PlayerIntent, UserCommand, PLAYER_COUNT};
use std::sync::Arc;

pub struct CommandHandler {
    intents: [Arc<PlayerIntent>; PLAYER_COUNT],
}

impl CommandHandler {
    pub fn new(intents: [Arc<PlayerIntent>; PLAYER_COUNT]) -> Self {
        Self { intents }
    }

    /// Applies a named command from `sender`. Returns false when the message was dropped.
    pub fn handle(&self, sender: u32, name: &str, payload: &[u8]) -> bool {
        if sender as usize >= PLAYER_COUNT {
            debug!("Dropping `{}` from out-of-range sender {}", name, sender);
            return false;
        }
        let intent = &self.intents[sender as usize];

        match UserCommand::decode(name, payload) {
            Some(UserCommand::Move(direction)) => {
                intent.start(direction);
                true
            }
            Some(UserCommand::StopMove) => {
                intent.stop();
                true
            }
            None => {
                debug!(
                    "Dropping malformed command `{}` ({} bytes) from {}",
                    name,
                    payload.len(),
                    sender
                );
                false
            }
        }
    }

    /// Clears the moving flag of a participant that left.
    pub fn release(&self, sender: u32) {
        if let Some(intent) = self.intents.get(sender as usize) {
            intent.stop();
        }
    }
}
