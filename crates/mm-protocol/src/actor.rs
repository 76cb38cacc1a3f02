//! Actor identity type

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::peer::PeerId;

/// Reserved uuid of the system actor present on every started peer
pub const SYSTEM_ACTOR_UUID: &str = "00000000-0000-0000-0000-000000000001";

/// Identity of an actor instance: a uuid scoped to the peer hosting it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId {
    /// Instance uuid, unique within the hosting peer
    pub uuid: String,
    /// The peer hosting the instance
    pub peer: PeerId,
}

impl ActorId {
    /// Create a new actor id
    pub fn new(uuid: impl Into<String>, peer: PeerId) -> Self {
        Self {
            uuid: uuid.into(),
            peer,
        }
    }

    /// The id of the system actor on the given peer
    pub fn system(peer: PeerId) -> Self {
        Self::new(SYSTEM_ACTOR_UUID, peer)
    }

    /// Whether this id names a peer's system actor
    pub fn is_system(&self) -> bool {
        self.uuid == SYSTEM_ACTOR_UUID
    }
}

impl fmt::Display for ActorId {
    /// Diagnostic form: the first 8 uuid characters at the hosting peer
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = &self.uuid[..self.uuid.len().min(8)];
        write!(f, "{}@{}", short, self.peer)
    }
}
