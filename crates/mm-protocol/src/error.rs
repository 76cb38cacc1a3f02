//! Protocol error types

use thiserror::Error;

/// Errors that can occur while parsing identities or framing messages
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A peer id string did not match `name@host:port`
    #[error("Invalid peer id: {0}")]
    InvalidPeerId(String),

    /// A frame failed to decode (bad length, tag, or payload)
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Payload exceeds the maximum frame size
    #[error("Payload too large: {size} bytes exceeds maximum of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    /// Envelope serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Argument or result payload encoding error
    #[error("JSON payload error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
