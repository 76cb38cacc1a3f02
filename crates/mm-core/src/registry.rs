//! Process-local actor and name registries

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use mm_protocol::{ActorId, PeerId};

use crate::error::MeshError;
use crate::traits::actor::ActorHandler;

/// Maps actor uuids to local actor instances
pub struct ActorRegistry {
    actors: DashMap<String, Arc<dyn ActorHandler>>,
}

impl ActorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            actors: DashMap::new(),
        }
    }

    /// Register an actor under its uuid.
    ///
    /// Uuids are unique by construction; a duplicate silently replaces the
    /// prior binding.
    pub fn register(&self, uuid: impl Into<String>, actor: Arc<dyn ActorHandler>) {
        self.actors.insert(uuid.into(), actor);
    }

    /// Look up an actor by uuid
    pub fn find(&self, uuid: &str) -> Option<Arc<dyn ActorHandler>> {
        self.actors.get(uuid).map(|r| Arc::clone(&r))
    }

    /// Remove an actor binding
    pub fn unregister(&self, uuid: &str) -> Option<Arc<dyn ActorHandler>> {
        self.actors.remove(uuid).map(|(_, actor)| actor)
    }

    /// Number of registered actors
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Remove every binding
    pub fn clear(&self) {
        self.actors.clear();
    }
}

impl Default for ActorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps member names to actor ids
pub struct NameRegistry {
    names: DashMap<String, ActorId>,
}

impl NameRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            names: DashMap::new(),
        }
    }

    /// Register a name if absent.
    ///
    /// Test-and-set atomic: of any set of concurrent registrations for the
    /// same name, exactly one succeeds.
    pub fn register(&self, name: impl Into<String>, actor_id: ActorId) -> Result<(), MeshError> {
        let name = name.into();
        match self.names.entry(name.clone()) {
            Entry::Occupied(_) => Err(MeshError::NameAlreadyTaken(name)),
            Entry::Vacant(entry) => {
                entry.insert(actor_id);
                Ok(())
            }
        }
    }

    /// Look up the actor id registered under a name
    pub fn find(&self, name: &str) -> Option<ActorId> {
        self.names.get(name).map(|r| r.clone())
    }

    /// Remove a name binding
    pub fn unregister(&self, name: &str) -> Option<ActorId> {
        self.names.remove(name).map(|(_, id)| id)
    }

    /// Remove every name bound to the given actor
    pub fn unregister_by_actor(&self, actor_id: &ActorId) {
        self.names.retain(|_, id| id != actor_id);
    }

    /// Remove every name whose actor lives on the given peer
    pub fn unregister_by_peer(&self, peer: &PeerId) {
        self.names.retain(|_, id| id.peer != *peer);
    }

    /// Snapshot of all bindings
    pub fn all_entries(&self) -> Vec<(String, ActorId)> {
        self.names
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }

    /// Number of registered names
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Remove every binding
    pub fn clear(&self) {
        self.names.clear();
    }
}

impl Default for NameRegistry {
    fn default() -> Self {
        Self::new()
    }
}
