//! List command: show every member in the mesh

use anyhow::Result;

use mm_core::MeshConfig;

use super::ephemeral_client;
use crate::output::format_members;

/// Connect to the mesh server and print the member directory.
///
/// When run inside a join session, `MM_NAME` marks the calling member.
pub async fn list_command(
    config: &MeshConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let host = host.unwrap_or_else(|| config.host.clone());
    let port = port.unwrap_or(config.port);

    let (system, _seed) = ephemeral_client(&host, port).await?;
    let result = async {
        let members = system.all_members_with_status().await?;
        let caller = std::env::var("MM_NAME").ok();
        println!("{}", format_members(&members, caller.as_deref()));
        Ok(())
    }
    .await;
    system.stop().await;
    result
}
