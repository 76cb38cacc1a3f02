//! mm-pty: The PTY collaborator
//!
//! Runs a child process attached to a pseudo-terminal and exposes it
//! through the `Pty` trait: thread-safe writes, an output stream pumped
//! by a dedicated reader thread, non-blocking child reaping, and a
//! bounded signal-escalation close path.

pub mod process;

pub use process::PtyProcess;
