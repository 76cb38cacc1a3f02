//! Runtime error taxonomy

use thiserror::Error;

use mm_protocol::{PeerId, ProtocolError, RuntimeError};

/// Top-level error type for the mm mesh
#[derive(Error, Debug)]
pub enum MeshError {
    /// A member name was rejected before registration
    #[error("Invalid member name: {0:?}")]
    InvalidName(String),

    /// The name is already registered to another actor
    #[error("Name already taken: {0}")]
    NameAlreadyTaken(String),

    /// The requested listening port is in use
    #[error("Port {0} unavailable")]
    PortUnavailable(u16),

    /// The transport failed to reach or keep a connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Dialing a peer exceeded the connect deadline
    #[error("Connection timed out")]
    ConnectionTimeout,

    /// No live connection exists for the addressed peer
    #[error("Peer not found: {0}")]
    PeerNotFound(PeerId),

    /// The call reached the peer but no actor holds the uuid
    #[error("Actor not found: {0}")]
    ActorNotFound(String),

    /// The method ran on the target peer but raised
    #[error("{target} failed: {message}")]
    ExecutionFailed { target: String, message: String },

    /// A remote call exceeded its deadline
    #[error("Call timed out")]
    Timeout,

    /// The system was stopped while the operation was in flight
    #[error("System stopped")]
    SystemStopped,

    /// The operation requires a started system
    #[error("System not started")]
    SystemNotStarted,

    /// The PTY behind a member is closed
    #[error("PTY closed")]
    PtyClosed,

    /// Protocol-level failure (parsing, framing, payload encoding)
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RuntimeError> for MeshError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::ActorNotFound { uuid } => MeshError::ActorNotFound(uuid),
            RuntimeError::ExecutionFailed { target, message } => {
                MeshError::ExecutionFailed { target, message }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_error_conversion() {
        let err: MeshError = RuntimeError::ActorNotFound {
            uuid: "u-1".to_string(),
        }
        .into();
        assert!(matches!(err, MeshError::ActorNotFound(u) if u == "u-1"));
    }

    #[test]
    fn test_display_includes_context() {
        let err = MeshError::PeerNotFound(PeerId::new("alice", "127.0.0.1", 50051));
        assert_eq!(err.to_string(), "Peer not found: alice@127.0.0.1:50051");
    }
}
