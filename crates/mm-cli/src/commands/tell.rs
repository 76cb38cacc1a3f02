//! Tell command: type a message into a member's terminal

use anyhow::{anyhow, Result};

use mm_core::MeshConfig;

use super::ephemeral_client;
use crate::output::print_success;

/// Resolve a member by name anywhere in the mesh and tell it `message`
pub async fn tell_command(
    config: &MeshConfig,
    name: &str,
    message: &str,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let host = host.unwrap_or_else(|| config.host.clone());
    let port = port.unwrap_or(config.port);

    let (system, seed) = ephemeral_client(&host, port).await?;
    let result = async {
        let info = system
            .system_ref(seed.clone())
            .find_member(name)
            .await?
            .ok_or_else(|| anyhow!("No member named {name:?} in the mesh"))?;

        // The member may live on a third peer; make sure we can reach it
        if info.peer_id != seed {
            system.connect_to_peer(&info.peer_id).await?;
        }
        system.member_ref(info.actor_id).tell(message).await?;
        print_success(&format!("Told {name}"));
        Ok(())
    }
    .await;
    system.stop().await;
    result
}
