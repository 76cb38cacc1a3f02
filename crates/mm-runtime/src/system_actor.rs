//! The per-peer system actor
//!
//! Every started system hosts one actor under the well-known uuid, so a
//! remote caller can query a peer it just met without any prior
//! discovery. `list_members` never makes outbound calls; two peers
//! exchanging on connect would otherwise call into each other forever.

use async_trait::async_trait;
use std::sync::Weak;
use std::time::Duration;

use mm_core::{ActorHandler, MemberInfo, MeshError};
use mm_protocol::{ActorId, ArgumentList, CallResult, PeerId};

use crate::actor::{success_value, unknown_target};
use crate::system::{CommunitySystem, SystemInner};

pub const TARGET_SYSTEM_FIND_MEMBER: &str = "System.find_member:1";
pub const TARGET_SYSTEM_LIST_MEMBERS: &str = "System.list_members:1";
pub const TARGET_SYSTEM_SHUTDOWN: &str = "System.shutdown:1";

/// Directory actor answering member queries for its peer
pub struct SystemActor {
    id: ActorId,
    system: Weak<SystemInner>,
}

impl SystemActor {
    pub(crate) fn new(id: ActorId, system: Weak<SystemInner>) -> Self {
        Self { id, system }
    }

    /// Search the local name registry, then the remote-member cache
    fn find_member(&self, name: &str) -> Option<MemberInfo> {
        self.system
            .upgrade()
            .and_then(|inner| inner.find_member_info(name))
    }

    /// Local members with live metadata plus cached remote members
    fn list_members(&self) -> Vec<MemberInfo> {
        let Some(inner) = self.system.upgrade() else {
            return vec![];
        };
        let mut members = inner.local_members_with_status();
        members.extend(inner.remote_members.iter().map(|e| e.value().clone()));
        members
    }

    /// Acknowledge, then stop the hosting system from a separate task so
    /// the response still reaches the caller
    fn shutdown(&self) {
        if let Some(inner) = self.system.upgrade() {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                SystemInner::stop_system(&inner).await;
            });
        }
    }
}

#[async_trait]
impl ActorHandler for SystemActor {
    fn actor_id(&self) -> &ActorId {
        &self.id
    }

    async fn dispatch(&self, target: &str, args: &ArgumentList) -> Result<CallResult, MeshError> {
        match target {
            TARGET_SYSTEM_FIND_MEMBER => {
                let name: String = args.reader().next()?;
                success_value(&self.find_member(&name))
            }
            TARGET_SYSTEM_LIST_MEMBERS => success_value(&self.list_members()),
            TARGET_SYSTEM_SHUTDOWN => {
                self.shutdown();
                Ok(CallResult::Void)
            }
            _ => Err(unknown_target(target)),
        }
    }
}

/// Proxy for the system actor on any peer
#[derive(Clone)]
pub struct SystemActorRef {
    system: CommunitySystem,
    id: ActorId,
}

impl SystemActorRef {
    pub fn new(system: CommunitySystem, peer: PeerId) -> Self {
        Self {
            system,
            id: ActorId::system(peer),
        }
    }

    /// The proxied actor id
    pub fn id(&self) -> &ActorId {
        &self.id
    }

    /// Look a member up by name on the target peer
    pub async fn find_member(&self, name: &str) -> Result<Option<MemberInfo>, MeshError> {
        self.system
            .remote_call(&self.id, TARGET_SYSTEM_FIND_MEMBER, ArgumentList::of(&name)?)
            .await
    }

    /// The target peer's member directory
    pub async fn list_members(&self) -> Result<Vec<MemberInfo>, MeshError> {
        self.system
            .remote_call(&self.id, TARGET_SYSTEM_LIST_MEMBERS, ArgumentList::new())
            .await
    }

    /// Ask the target peer to leave the mesh and stop
    pub async fn shutdown(&self) -> Result<(), MeshError> {
        self.system
            .remote_call_void(&self.id, TARGET_SYSTEM_SHUTDOWN, ArgumentList::new())
            .await
    }
}
