//! Sink-specific error types.
//!
//! All sink operations return [`StorageError`] on failure, which can be
//! matched to tell a connection problem from a rejected write.

use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The sink could not be reached or refused the session setup.
    #[error("sink connection error: {0}")]
    Connection(String),

    /// The sink rejected a write.
    #[error("sink write failed (status {status}): {body}")]
    Write { status: u16, body: String },

    /// Transport failure while talking to the sink.
    #[error("sink transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A point could not be encoded for the wire.
    #[error("failed to encode point: {0}")]
    Encode(String),

    /// The sink was used before `connect` succeeded.
    #[error("sink is not connected")]
    NotConnected,
}
