//! PTY collaborator seam
//!
//! The runtime never touches file descriptors; it drives the child process
//! through this trait. Writes are synchronous and thread-safe. Reads from
//! the PTY master flow through the collaborator's own background task.

use crate::error::MeshError;

/// A child process attached to a pseudo-terminal
pub trait Pty: Send + Sync {
    /// Write text followed by a carriage return, as if typed and entered
    fn write_line(&self, text: &str) -> Result<(), MeshError>;

    /// Write raw bytes to the PTY master
    fn write_raw(&self, bytes: &[u8]) -> Result<(), MeshError>;

    /// Whether the child process is still running; reaps zombies via
    /// non-blocking wait
    fn is_running(&self) -> bool;

    /// Terminate the child, escalating signals over a bounded timeline
    fn close(&self);

    /// The command line the child was spawned with
    fn command(&self) -> Option<String> {
        None
    }

    /// The child's current working directory
    fn cwd(&self) -> Option<String> {
        None
    }

    /// Name of the process currently in the foreground of the terminal
    fn foreground_process(&self) -> Option<String> {
        None
    }
}
