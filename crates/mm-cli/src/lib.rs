//! mm-cli: Command-line interface for the mm mesh
//!
//! Provides the `mm` binary: `join` an interactive member session,
//! `tell` a member, `list` the mesh, `kill` join sessions.

pub mod commands;
pub mod output;
