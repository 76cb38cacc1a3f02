//! mm-runtime: The distributed-call runtime of the mm mesh
//!
//! A `CommunitySystem` owns the registries and the per-connection message
//! loops; a `PeerNode` owns listening, dialing, and connection
//! bookkeeping; members and the per-peer system actor are dispatched
//! through an explicit target table. The reference transport speaks
//! length-prefixed frames over TCP.

pub mod actor;
pub mod member;
pub mod node;
pub mod system;
pub mod system_actor;
pub mod tcp;

pub use member::{
    Member, MemberRef, TARGET_MEMBER_GET_COMMAND, TARGET_MEMBER_GET_CWD,
    TARGET_MEMBER_GET_FOREGROUND, TARGET_MEMBER_GET_NAME, TARGET_MEMBER_IS_RUNNING,
    TARGET_MEMBER_TELL,
};
pub use node::PeerNode;
pub use system::CommunitySystem;
pub use system_actor::{
    SystemActor, SystemActorRef, TARGET_SYSTEM_FIND_MEMBER, TARGET_SYSTEM_LIST_MEMBERS,
    TARGET_SYSTEM_SHUTDOWN,
};
pub use tcp::TcpTransport;
