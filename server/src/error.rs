use shared::SchemaError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening port could not be bound. Fatal at startup.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("schema configuration error: {0}")]
    Schema(#[from] SchemaError),

    #[error("network error: {0}")]
    Io(#[from] io::Error),

    #[error("simulation thread panicked")]
    SimulationPanicked,
}
