//! Actor dispatch seam
//!
//! There is no language-level distributed-actor support; each actor kind
//! registers a dispatch table keyed by stable method identifiers such as
//! `Member.tell:1`, and remote proxies are plain values that encode
//! arguments and route through the call runtime.

use async_trait::async_trait;

use mm_protocol::{ActorId, ArgumentList, CallResult};

use crate::error::MeshError;
use crate::types::MemberInfo;

/// A local actor instance reachable through the call runtime
#[async_trait]
pub trait ActorHandler: Send + Sync {
    /// The identity this actor is registered under
    fn actor_id(&self) -> &ActorId;

    /// Decode the arguments and invoke the method named by `target`.
    ///
    /// Unknown targets fail with `ExecutionFailed`.
    async fn dispatch(&self, target: &str, args: &ArgumentList) -> Result<CallResult, MeshError>;

    /// Live description of this actor for member enumeration, when it
    /// represents a member
    fn info(&self) -> Option<MemberInfo> {
        None
    }

    /// Called after the actor is unregistered; may block briefly (the
    /// runtime invokes it off the async executor)
    fn resign(&self) {}
}
