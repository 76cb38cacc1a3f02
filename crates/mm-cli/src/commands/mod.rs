//! CLI command implementations

mod join;
mod kill;
mod list;
mod tell;

pub use join::{join_command, JoinArgs};
pub use kill::kill_command;
pub use list::list_command;
pub use tell::tell_command;

use anyhow::{Context, Result};
use std::sync::Arc;

use mm_protocol::PeerId;
use mm_runtime::{CommunitySystem, PeerNode, TcpTransport};

/// Start a short-lived client system on an ephemeral port
pub(crate) async fn ephemeral_system() -> Result<CommunitySystem> {
    let name = format!("mm-cli-{}", std::process::id());
    let peer = PeerId::new(&name, "127.0.0.1", 0);
    let node = PeerNode::new(peer, Arc::new(TcpTransport::new()));
    let system = CommunitySystem::new(&name, node);
    system.start().await?;
    Ok(system)
}

/// Start a client system and connect it to the mesh server at `host:port`
pub(crate) async fn ephemeral_client(host: &str, port: u16) -> Result<(CommunitySystem, PeerId)> {
    let system = ephemeral_system().await?;
    let seed = system
        .connect_to_peer(&PeerId::unnamed(host, port))
        .await
        .with_context(|| format!("No mesh server reachable at {host}:{port}"))?;
    Ok((system, seed))
}
