//! Shared domain types

use serde::{Deserialize, Serialize};

use mm_protocol::{ActorId, PeerId};

/// Description of a member as returned by member enumeration.
///
/// The optional fields carry PTY introspection; `None` means the
/// collaborator did not provide the datum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberInfo {
    /// Registered member name
    pub name: String,
    /// Identity of the member actor
    pub actor_id: ActorId,
    /// Peer hosting the member
    pub peer_id: PeerId,
    /// Transport the hosting peer speaks, e.g. `tcp`
    pub transport: String,
    /// Command line running inside the PTY
    pub command: Option<String>,
    /// Working directory of the PTY child
    pub cwd: Option<String>,
    /// Process currently in the foreground of the PTY
    pub foreground_process: Option<String>,
}

impl MemberInfo {
    /// Info with no PTY introspection attached
    pub fn bare(
        name: impl Into<String>,
        actor_id: ActorId,
        transport: impl Into<String>,
    ) -> Self {
        let peer_id = actor_id.peer.clone();
        Self {
            name: name.into(),
            actor_id,
            peer_id,
            transport: transport.into(),
            command: None,
            cwd: None,
            foreground_process: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_info_serde_roundtrip() {
        let peer = PeerId::new("alice", "127.0.0.1", 50051);
        let info = MemberInfo {
            name: "alice".to_string(),
            actor_id: ActorId::new("u-1", peer.clone()),
            peer_id: peer,
            transport: "tcp".to_string(),
            command: Some("/bin/zsh".to_string()),
            cwd: None,
            foreground_process: Some("vim".to_string()),
        };
        let json = serde_json::to_vec(&info).unwrap();
        let back: MemberInfo = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, info);
    }

    #[test]
    fn test_bare_copies_peer_from_actor() {
        let peer = PeerId::new("a", "h", 1);
        let info = MemberInfo::bare("m", ActorId::new("u", peer.clone()), "tcp");
        assert_eq!(info.peer_id, peer);
        assert!(info.command.is_none());
    }
}
