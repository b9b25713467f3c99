//! Error types for spindle-player
//!
//! Errors never escape a control-loop tick: the engine logs them and turns
//! them into item outcomes (finish without history, return to stopped).

use thiserror::Error;

/// Main error type for the player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Source could not be prepared into a playable local resource
    #[error("Preparation failed for {source_ref}: {reason}")]
    Preparation { source_ref: String, reason: String },

    /// Player backend rejected an operation
    #[error("Backend error: {0}")]
    Backend(String),

    /// System volume backend errors
    #[error("Volume error: {0}")]
    Volume(String),

    /// Operation not supported by the backend (seek, speed)
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Command meaningless in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Engine control loop is gone
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// Errors from the shared library
    #[error(transparent)]
    Common(#[from] spindle_common::Error),
}

/// Convenience Result type using the player Error
pub type Result<T> = std::result::Result<T, Error>;
