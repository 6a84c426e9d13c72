//! Observer side of the `Initialize` handshake.
//!
//! States move `Unauthenticated -> Initialized -> Disconnected`. A bad
//! identifier ends in `Failed` instead. Both `Failed` and `Disconnected`
//! are terminal.

use crate::error::JoinError;
use log::{debug, info, warn};
use shared::{Initialize, PLAYER_COUNT};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    Unauthenticated,
    Initialized(u32),
    /// `Initialize` carried an identifier outside `[0, PLAYER_COUNT)`.
    Failed(i32),
    Disconnected(String),
}

/// Shared between the receive task, which feeds it, and the joining caller,
/// which waits on it.
pub struct Handshake {
    state: Mutex<HandshakeState>,
    changed: Notify,
}

impl Handshake {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HandshakeState::Unauthenticated),
            changed: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HandshakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> HandshakeState {
        self.lock().clone()
    }

    pub fn user_id(&self) -> Option<u32> {
        match *self.lock() {
            HandshakeState::Initialized(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.user_id().is_some()
    }

    /// Feeds an `Initialize` payload. Returns true if the state changed.
    ///
    /// Short payloads are dropped and leave the state as it was. Anything
    /// after the first decisive message is ignored.
    pub fn handle_initialize(&self, payload: &[u8]) -> bool {
        let mut state = self.lock();
        if *state != HandshakeState::Unauthenticated {
            debug!("Ignoring Initialize in state {:?}", *state);
            return false;
        }

        let Some(Initialize { user_id }) = Initialize::decode(payload) else {
            warn!("Dropping short Initialize ({} bytes)", payload.len());
            return false;
        };

        *state = match u32::try_from(user_id) {
            Ok(id) if (id as usize) < PLAYER_COUNT => {
                info!("Initialized as participant {}", id);
                HandshakeState::Initialized(id)
            }
            _ => {
                warn!("Initialize carried out-of-range id {}", user_id);
                HandshakeState::Failed(user_id)
            }
        };
        drop(state);

        self.changed.notify_one();
        true
    }

    /// The simulator refused us or closed the connection.
    pub fn disconnect(&self, reason: impl Into<String>) {
        let mut state = self.lock();
        if matches!(*state, HandshakeState::Failed(_)) {
            return;
        }
        *state = HandshakeState::Disconnected(reason.into());
        drop(state);

        self.changed.notify_one();
    }

    fn outcome(&self) -> Option<Result<u32, JoinError>> {
        match &*self.lock() {
            HandshakeState::Unauthenticated => None,
            HandshakeState::Initialized(id) => Some(Ok(*id)),
            HandshakeState::Failed(user_id) => {
                Some(Err(JoinError::InvalidIdentity { user_id: *user_id }))
            }
            HandshakeState::Disconnected(reason) => Some(Err(JoinError::Rejected {
                reason: reason.clone(),
            })),
        }
    }

    /// Waits until the handshake is decided or `timeout` elapses.
    pub async fn wait(&self, timeout: Duration) -> Result<u32, JoinError> {
        let decided = async {
            loop {
                if let Some(outcome) = self.outcome() {
                    return outcome;
                }
                self.changed.notified().await;
            }
        };

        tokio::time::timeout(timeout, decided)
            .await
            .map_err(|_| JoinError::Timeout)?
    }
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}
