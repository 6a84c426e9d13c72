use std::io;
use thiserror::Error;

/// Why joining a simulator failed. Every variant leaves the connection
/// discardable; the caller may retry or host a simulator itself.
#[derive(Debug, Error)]
pub enum JoinError {
    #[error("network error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid server address `{0}`")]
    InvalidAddress(String),

    #[error("no Initialize received within the join timeout")]
    Timeout,

    #[error("rejected by server: {reason}")]
    Rejected { reason: String },

    #[error("server assigned out-of-range participant id {user_id}")]
    InvalidIdentity { user_id: i32 },

    #[error("connection closed")]
    Closed,
}
