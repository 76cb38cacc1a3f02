//! The distributed-call runtime
//!
//! A `CommunitySystem` routes method calls to local actors directly and to
//! remote actors over the node's connections, correlating responses to
//! invocations through a pending-call table. Connecting peers exchange
//! their member lists, so every peer can enumerate the whole mesh.

use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

use mm_core::{
    ActorHandler, ActorRegistry, Connection, MemberInfo, MeshError, NameRegistry, Pty,
};
use mm_protocol::{
    ActorId, ArgumentList, CallResult, Frame, InvocationEnvelope, PeerId, ResponseEnvelope,
    RuntimeError, SYSTEM_ACTOR_UUID,
};
use serde::de::DeserializeOwned;

use crate::member::{Member, MemberRef};
use crate::node::PeerNode;
use crate::system_actor::{SystemActor, SystemActorRef, TARGET_SYSTEM_LIST_MEMBERS};

/// Default deadline for a remote call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline for fetching fresh member info from a peer
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(3);

type CallReply = Result<ResponseEnvelope, MeshError>;

/// The distributed-call runtime for one peer
#[derive(Clone)]
pub struct CommunitySystem {
    inner: Arc<SystemInner>,
}

pub(crate) struct SystemInner {
    name: String,
    node: Arc<PeerNode>,
    pub(crate) actors: ActorRegistry,
    pub(crate) names: NameRegistry,
    /// Known members on other peers, keyed by actor uuid
    pub(crate) remote_members: DashMap<String, MemberInfo>,
    /// In-flight outgoing calls awaiting a response
    pending: Mutex<HashMap<String, oneshot::Sender<CallReply>>>,
    /// Lifecycle state; grouped under one lock so transitions are atomic
    state: Mutex<SystemState>,
    call_timeout: Duration,
}

#[derive(Default)]
struct SystemState {
    started: bool,
    /// Where each in-flight inbound call arrived from (diagnostics)
    response_routes: HashMap<String, PeerId>,
    /// Which peer each outgoing call was routed through
    outgoing_call_peers: HashMap<String, PeerId>,
    accept_task: Option<JoinHandle<()>>,
    conn_tasks: HashMap<PeerId, JoinHandle<()>>,
    exchange_tasks: Vec<JoinHandle<()>>,
}

/// Removes the pending-call entry unless the responder already did, so a
/// cancelled or failed awaiter never leaks its slot
struct PendingCallGuard<'a> {
    inner: &'a SystemInner,
    call_id: &'a str,
    completed: bool,
}

impl Drop for PendingCallGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.inner.take_pending(self.call_id);
        }
    }
}

impl CommunitySystem {
    /// Create a system around a node; nothing runs until `start`
    pub fn new(name: impl Into<String>, node: PeerNode) -> Self {
        Self::with_call_timeout(name, node, DEFAULT_CALL_TIMEOUT)
    }

    /// Create a system with a custom remote-call deadline
    pub fn with_call_timeout(
        name: impl Into<String>,
        node: PeerNode,
        call_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(SystemInner {
                name: name.into(),
                node: Arc::new(node),
                actors: ActorRegistry::new(),
                names: NameRegistry::new(),
                remote_members: DashMap::new(),
                pending: Mutex::new(HashMap::new()),
                state: Mutex::new(SystemState::default()),
                call_timeout,
            }),
        }
    }

    /// The system's own name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The local peer identity (port is final once started)
    pub fn local_peer_id(&self) -> PeerId {
        self.inner.node.local_peer_id()
    }

    /// Peers with a live connection
    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.inner.node.connected_peers()
    }

    /// Bind the node, create the system actor, and start serving inbound
    /// connections. Idempotent.
    pub async fn start(&self) -> Result<(), MeshError> {
        {
            let mut st = self.inner.state.lock().unwrap();
            if st.started {
                return Ok(());
            }
            st.started = true;
        }

        if let Err(e) = self.inner.node.start().await {
            self.inner.state.lock().unwrap().started = false;
            return Err(e);
        }

        let local = self.inner.node.local_peer_id();
        let system_actor = Arc::new(SystemActor::new(
            ActorId::system(local.clone()),
            Arc::downgrade(&self.inner),
        ));
        self.inner.actors.register(SYSTEM_ACTOR_UUID, system_actor);

        if let Some(mut incoming) = self.inner.node.take_incoming() {
            let inner = Arc::clone(&self.inner);
            let handle = tokio::spawn(async move {
                while let Some((peer, conn)) = incoming.recv().await {
                    tracing::info!("Peer connected: {peer}");
                    inner.node.adopt(peer.clone(), Arc::clone(&conn));
                    SystemInner::spawn_connection_loop(&inner, peer.clone(), conn);

                    let exchange_inner = Arc::clone(&inner);
                    let exchange = tokio::spawn(async move {
                        if let Err(e) =
                            SystemInner::exchange_member_info(&exchange_inner, &peer).await
                        {
                            tracing::debug!("Member exchange with {peer} failed: {e}");
                        }
                    });
                    let mut st = inner.state.lock().unwrap();
                    st.exchange_tasks.retain(|t| !t.is_finished());
                    st.exchange_tasks.push(exchange);
                }
            });
            self.inner.state.lock().unwrap().accept_task = Some(handle);
        }

        tracing::info!("System {} started at {local}", self.inner.name);
        Ok(())
    }

    /// Cancel every task, fail every pending call, close the node, and
    /// clear the registries. Idempotent; a no-op without prior `start`.
    pub async fn stop(&self) {
        SystemInner::stop_system(&self.inner).await;
    }

    /// Dial a peer, start its message loop, and exchange member lists.
    /// Returns the remote's self-reported identity.
    pub async fn connect_to_peer(&self, peer: &PeerId) -> Result<PeerId, MeshError> {
        if !self.inner.is_started() {
            return Err(MeshError::SystemNotStarted);
        }
        let effective = SystemInner::ensure_connected(&self.inner, peer).await?;
        if let Err(e) = SystemInner::exchange_member_info(&self.inner, &effective).await {
            tracing::debug!("Member exchange with {effective} failed: {e}");
        }
        Ok(effective)
    }

    /// Drop the connection to a peer, if any
    pub async fn disconnect_peer(&self, peer: &PeerId) {
        self.inner.node.disconnect(peer).await;
    }

    /// Create a member wrapping a PTY and register it under `name`
    pub fn create_member(
        &self,
        name: &str,
        pty: Arc<dyn Pty>,
        owns_pty: bool,
    ) -> Result<MemberRef, MeshError> {
        if !self.inner.is_started() {
            return Err(MeshError::SystemNotStarted);
        }
        validate_member_name(name)?;

        let local = self.inner.node.local_peer_id();
        let id = ActorId::new(Uuid::new_v4().to_string(), local);
        self.inner.names.register(name, id.clone())?;

        let member = Arc::new(Member::new(
            name,
            id.clone(),
            pty,
            owns_pty,
            self.inner.node.transport_name(),
        ));
        self.inner.actors.register(id.uuid.clone(), member);
        tracing::info!("Member {name} ready as {id}");
        Ok(MemberRef::new(self.clone(), id))
    }

    /// Unregister an actor and every name bound to it
    pub async fn resign_id(&self, id: &ActorId) {
        self.inner.names.unregister_by_actor(id);
        if let Some(actor) = self.inner.actors.unregister(&id.uuid) {
            tracing::info!("Actor {id} resigned");
            // resign may block on process teardown
            let _ = tokio::task::spawn_blocking(move || actor.resign()).await;
        }
    }

    /// Look up a local actor instance by id
    pub fn resolve(&self, id: &ActorId) -> Option<Arc<dyn ActorHandler>> {
        self.inner.actors.find(&id.uuid)
    }

    /// Proxy for a member with the given id, wherever it lives
    pub fn member_ref(&self, id: ActorId) -> MemberRef {
        MemberRef::new(self.clone(), id)
    }

    /// Proxy for the system actor on the given peer
    pub fn system_ref(&self, peer: PeerId) -> SystemActorRef {
        SystemActorRef::new(self.clone(), peer)
    }

    /// Call a method on an actor and decode its return value.
    ///
    /// Local actors dispatch synchronously; remote actors go through the
    /// peer's connection and the pending-call table.
    pub async fn remote_call<R: DeserializeOwned>(
        &self,
        actor: &ActorId,
        target: &str,
        args: ArgumentList,
    ) -> Result<R, MeshError> {
        let response = SystemInner::dispatch_call(&self.inner, actor, target, args).await?;
        match response.result {
            CallResult::Success(payload) => serde_json::from_slice(&payload)
                .map_err(|e| MeshError::Protocol(e.into())),
            // A void response decodes as JSON null, so `()` and options work
            CallResult::Void => {
                serde_json::from_slice(b"null").map_err(|e| MeshError::Protocol(e.into()))
            }
            CallResult::Failure(err) => Err(err.into()),
        }
    }

    /// Call a method on an actor, discarding any return value
    pub async fn remote_call_void(
        &self,
        actor: &ActorId,
        target: &str,
        args: ArgumentList,
    ) -> Result<(), MeshError> {
        let response = SystemInner::dispatch_call(&self.inner, actor, target, args).await?;
        match response.result {
            CallResult::Void | CallResult::Success(_) => Ok(()),
            CallResult::Failure(err) => Err(err.into()),
        }
    }

    /// Every known member: locals first with live PTY metadata, then
    /// remote members grouped by peer, refreshed under a deadline with
    /// the cache as fallback.
    pub async fn all_members_with_status(&self) -> Result<Vec<MemberInfo>, MeshError> {
        if !self.inner.is_started() {
            return Err(MeshError::SystemNotStarted);
        }
        let mut out = self.inner.local_members_with_status();

        let mut by_peer: BTreeMap<String, (PeerId, Vec<MemberInfo>)> = BTreeMap::new();
        for entry in self.inner.remote_members.iter() {
            let info = entry.value().clone();
            by_peer
                .entry(info.peer_id.to_string())
                .or_insert_with(|| (info.peer_id.clone(), Vec::new()))
                .1
                .push(info);
        }

        for (_, (peer, mut cached)) in by_peer {
            match self.refresh_peer_members(&peer).await {
                Ok(mut fresh) => {
                    fresh.sort_by(|a, b| a.name.cmp(&b.name));
                    out.extend(fresh);
                }
                Err(e) => {
                    tracing::debug!("Using cached members for {peer}: {e}");
                    cached.sort_by(|a, b| a.name.cmp(&b.name));
                    out.extend(cached);
                }
            }
        }
        Ok(out)
    }

    /// Fetch fresh member info from one peer and update the cache
    async fn refresh_peer_members(&self, peer: &PeerId) -> Result<Vec<MemberInfo>, MeshError> {
        SystemInner::ensure_connected(&self.inner, peer).await?;
        let members = tokio::time::timeout(
            EXCHANGE_TIMEOUT,
            SystemInner::fetch_remote_members(&self.inner, peer),
        )
        .await
        .map_err(|_| MeshError::Timeout)??;

        let members: Vec<MemberInfo> = members
            .into_iter()
            .filter(|m| m.peer_id == *peer)
            .collect();
        // Replace the peer's cache slice wholesale so resigned members
        // do not linger
        self.inner.remote_members.retain(|_, m| m.peer_id != *peer);
        for member in &members {
            self.inner
                .remote_members
                .insert(member.actor_id.uuid.clone(), member.clone());
        }
        Ok(members)
    }
}

impl SystemInner {
    pub(crate) fn is_started(&self) -> bool {
        self.state.lock().unwrap().started
    }

    /// Remove a pending call from both the table and the routing map
    fn take_pending(&self, call_id: &str) -> Option<oneshot::Sender<CallReply>> {
        let sender = self.pending.lock().unwrap().remove(call_id);
        self.state
            .lock()
            .unwrap()
            .outgoing_call_peers
            .remove(call_id);
        sender
    }

    /// Route a call locally or over the wire and wait for its response
    async fn dispatch_call(
        inner: &Arc<SystemInner>,
        actor: &ActorId,
        target: &str,
        args: ArgumentList,
    ) -> Result<ResponseEnvelope, MeshError> {
        if !inner.is_started() {
            return Err(MeshError::SystemNotStarted);
        }
        let local = inner.node.local_peer_id();
        let envelope = InvocationEnvelope {
            call_id: Uuid::new_v4().to_string(),
            recipient_uuid: actor.uuid.clone(),
            sender_peer: local.to_string(),
            target: target.to_string(),
            arguments: args.encode(),
        };

        if actor.peer == local {
            // Local dispatch runs to completion before the caller resumes
            return Ok(Self::compute_response(inner, envelope).await);
        }

        let conn = inner
            .node
            .transport_for(&actor.peer)
            .ok_or_else(|| MeshError::PeerNotFound(actor.peer.clone()))?;

        let call_id = envelope.call_id.clone();
        let (tx, rx) = oneshot::channel();
        // The slot must exist before the frame can possibly be answered
        inner.pending.lock().unwrap().insert(call_id.clone(), tx);
        inner
            .state
            .lock()
            .unwrap()
            .outgoing_call_peers
            .insert(call_id.clone(), actor.peer.clone());
        let mut guard = PendingCallGuard {
            inner,
            call_id: &call_id,
            completed: false,
        };

        conn.send(Frame::Invocation(envelope)).await?;

        match tokio::time::timeout(inner.call_timeout, rx).await {
            Ok(Ok(reply)) => {
                guard.completed = true;
                reply
            }
            Ok(Err(_)) => Err(MeshError::ConnectionFailed(
                "call abandoned without a response".to_string(),
            )),
            Err(_) => Err(MeshError::Timeout),
        }
    }

    /// Find the recipient, decode the arguments, run the method, and
    /// package the outcome
    pub(crate) async fn compute_response(
        inner: &Arc<SystemInner>,
        envelope: InvocationEnvelope,
    ) -> ResponseEnvelope {
        let Some(actor) = inner.actors.find(&envelope.recipient_uuid) else {
            return ResponseEnvelope::failure(
                envelope.call_id,
                RuntimeError::ActorNotFound {
                    uuid: envelope.recipient_uuid,
                },
            );
        };
        let args = match ArgumentList::decode(&envelope.arguments) {
            Ok(args) => args,
            Err(e) => {
                return ResponseEnvelope::failure(
                    envelope.call_id,
                    RuntimeError::ExecutionFailed {
                        target: envelope.target,
                        message: e.to_string(),
                    },
                )
            }
        };
        match actor.dispatch(&envelope.target, &args).await {
            Ok(result) => ResponseEnvelope {
                call_id: envelope.call_id,
                result,
            },
            Err(MeshError::ExecutionFailed { target, message }) => {
                ResponseEnvelope::failure(envelope.call_id, RuntimeError::ExecutionFailed {
                    target,
                    message,
                })
            }
            Err(e) => ResponseEnvelope::failure(
                envelope.call_id,
                RuntimeError::ExecutionFailed {
                    target: envelope.target,
                    message: e.to_string(),
                },
            ),
        }
    }

    /// Connect to a peer if no live connection exists, and make sure a
    /// message loop is reading it
    async fn ensure_connected(
        inner: &Arc<SystemInner>,
        peer: &PeerId,
    ) -> Result<PeerId, MeshError> {
        if inner.node.transport_for(peer).is_some() {
            return Ok(peer.clone());
        }
        let (effective, conn) = inner.node.connect(peer).await?;
        let needs_loop = {
            let st = inner.state.lock().unwrap();
            st.conn_tasks
                .get(&effective)
                .map(|t| t.is_finished())
                .unwrap_or(true)
        };
        if needs_loop {
            Self::spawn_connection_loop(inner, effective.clone(), conn);
        }
        Ok(effective)
    }

    pub(crate) fn spawn_connection_loop(
        inner: &Arc<SystemInner>,
        peer: PeerId,
        conn: Arc<dyn Connection>,
    ) {
        let task_inner = Arc::clone(inner);
        let task_peer = peer.clone();
        let handle = tokio::spawn(async move {
            Self::run_connection(&task_inner, &task_peer, conn).await;
        });
        let mut st = inner.state.lock().unwrap();
        if let Some(old) = st.conn_tasks.insert(peer, handle) {
            old.abort();
        }
    }

    /// Read frames off one connection until it ends, then clean up after
    /// the departed peer
    async fn run_connection(
        inner: &Arc<SystemInner>,
        peer: &PeerId,
        conn: Arc<dyn Connection>,
    ) {
        loop {
            match conn.recv().await {
                Ok(Some(Frame::Invocation(envelope))) => {
                    let call_id = envelope.call_id.clone();
                    inner
                        .state
                        .lock()
                        .unwrap()
                        .response_routes
                        .insert(call_id.clone(), peer.clone());

                    let response = Self::compute_response(inner, envelope).await;
                    let sent = conn.send(Frame::Response(response)).await;

                    inner
                        .state
                        .lock()
                        .unwrap()
                        .response_routes
                        .remove(&call_id);
                    if let Err(e) = sent {
                        tracing::debug!("Failed to respond to {peer}: {e}");
                        break;
                    }
                }
                Ok(Some(Frame::Response(envelope))) => {
                    if let Some(tx) = inner.take_pending(&envelope.call_id) {
                        // A dropped receiver means the awaiter was
                        // cancelled; the late response is discarded
                        let _ = tx.send(Ok(envelope));
                    }
                }
                Ok(Some(Frame::Hello(reported))) => {
                    tracing::debug!("Ignoring repeated handshake from {reported}");
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!("Connection to {peer} errored: {e}");
                    break;
                }
            }
        }
        Self::cleanup_departed_peer(inner, peer).await;
    }

    /// Fail calls routed through the peer, drop its cached members and
    /// names, and forget its connection
    async fn cleanup_departed_peer(inner: &Arc<SystemInner>, peer: &PeerId) {
        tracing::info!("Peer disconnected: {peer}");
        inner.node.disconnect(peer).await;

        // Forget the peer's members and names before failing its calls,
        // so a resumed awaiter already sees the departed peer gone
        inner.remote_members.retain(|_, info| info.peer_id != *peer);
        inner.names.unregister_by_peer(peer);

        let routed: Vec<String> = {
            let st = inner.state.lock().unwrap();
            st.outgoing_call_peers
                .iter()
                .filter(|&(_, p)| p == peer)
                .map(|(id, _)| id.clone())
                .collect()
        };
        for call_id in routed {
            if let Some(tx) = inner.take_pending(&call_id) {
                let _ = tx.send(Err(MeshError::ConnectionFailed(format!(
                    "connection to {peer} dropped"
                ))));
            }
        }

        let mut st = inner.state.lock().unwrap();
        st.conn_tasks.remove(peer);
        st.response_routes.retain(|_, p| p != peer);
    }

    /// Pull the peer's member list into the local cache; best-effort
    pub(crate) async fn exchange_member_info(
        inner: &Arc<SystemInner>,
        peer: &PeerId,
    ) -> Result<(), MeshError> {
        let members = Self::fetch_remote_members(inner, peer).await?;
        let local = inner.node.local_peer_id();
        for info in members {
            if info.peer_id == local {
                continue;
            }
            inner.remote_members.insert(info.actor_id.uuid.clone(), info);
        }
        Ok(())
    }

    async fn fetch_remote_members(
        inner: &Arc<SystemInner>,
        peer: &PeerId,
    ) -> Result<Vec<MemberInfo>, MeshError> {
        let system_id = ActorId::system(peer.clone());
        let response =
            Self::dispatch_call(inner, &system_id, TARGET_SYSTEM_LIST_MEMBERS, ArgumentList::new())
                .await?;
        match response.result {
            CallResult::Success(payload) => {
                serde_json::from_slice(&payload).map_err(|e| MeshError::Protocol(e.into()))
            }
            CallResult::Void => Ok(vec![]),
            CallResult::Failure(err) => Err(err.into()),
        }
    }

    /// Local name-registry entries with live PTY metadata, sorted by name
    pub(crate) fn local_members_with_status(&self) -> Vec<MemberInfo> {
        let mut entries = self.names.all_entries();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
            .into_iter()
            .map(|(name, actor_id)| {
                match self.actors.find(&actor_id.uuid).and_then(|a| a.info()) {
                    Some(info) => info,
                    None => MemberInfo::bare(name, actor_id, self.node.transport_name()),
                }
            })
            .collect()
    }

    /// A member by name: the local registry first, then the remote cache
    pub(crate) fn find_member_info(&self, name: &str) -> Option<MemberInfo> {
        if let Some(actor_id) = self.names.find(name) {
            let info = match self.actors.find(&actor_id.uuid).and_then(|a| a.info()) {
                Some(info) => info,
                None => MemberInfo::bare(name, actor_id, self.node.transport_name()),
            };
            return Some(info);
        }
        self.remote_members
            .iter()
            .find(|entry| entry.value().name == name)
            .map(|entry| entry.value().clone())
    }

    /// Tear the system down; shared by `stop` and the system actor's
    /// shutdown method
    pub(crate) async fn stop_system(inner: &Arc<SystemInner>) {
        let (accept, conns, exchanges) = {
            let mut st = inner.state.lock().unwrap();
            if !st.started {
                return;
            }
            st.started = false;
            st.response_routes.clear();
            st.outgoing_call_peers.clear();
            (
                st.accept_task.take(),
                std::mem::take(&mut st.conn_tasks),
                std::mem::take(&mut st.exchange_tasks),
            )
        };
        if let Some(task) = accept {
            task.abort();
        }
        for (_, task) in conns {
            task.abort();
        }
        for task in exchanges {
            task.abort();
        }

        let drained: Vec<_> = {
            let mut pending = inner.pending.lock().unwrap();
            pending.drain().collect()
        };
        for (_, tx) in drained {
            let _ = tx.send(Err(MeshError::SystemStopped));
        }

        inner.node.stop().await;
        inner.actors.clear();
        inner.names.clear();
        inner.remote_members.clear();
        tracing::info!("System {} stopped", inner.name);
    }
}

fn validate_member_name(name: &str) -> Result<(), MeshError> {
    if name.is_empty()
        || name.contains('@')
        || name.contains(':')
        || name.chars().any(char::is_whitespace)
    {
        return Err(MeshError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_name_validation() {
        assert!(validate_member_name("alice").is_ok());
        assert!(validate_member_name("alice-2").is_ok());
        assert!(validate_member_name("").is_err());
        assert!(validate_member_name("a@b").is_err());
        assert!(validate_member_name("a:b").is_err());
        assert!(validate_member_name("a b").is_err());
    }
}
