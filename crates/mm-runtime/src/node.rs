//! Peer node: listening, dialing, and connection bookkeeping

use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use mm_core::{Connection, Listener, MeshError, Transport};
use mm_protocol::PeerId;

/// Buffered inbound connections awaiting the consumer
const INCOMING_CHANNEL_CAPACITY: usize = 32;

/// Owns the listening endpoint and the set of live connections, keyed by
/// the remote's self-reported peer id
pub struct PeerNode {
    transport: Arc<dyn Transport>,
    local: Mutex<PeerId>,
    connections: DashMap<PeerId, Arc<dyn Connection>>,
    incoming_tx: mpsc::Sender<(PeerId, Arc<dyn Connection>)>,
    incoming_rx: Mutex<Option<mpsc::Receiver<(PeerId, Arc<dyn Connection>)>>>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl PeerNode {
    /// Create a node that will listen at `local` once started
    pub fn new(local: PeerId, transport: Arc<dyn Transport>) -> Self {
        let (incoming_tx, incoming_rx) = mpsc::channel(INCOMING_CHANNEL_CAPACITY);
        Self {
            transport,
            local: Mutex::new(local),
            connections: DashMap::new(),
            incoming_tx,
            incoming_rx: Mutex::new(Some(incoming_rx)),
            accept_task: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    /// The local identity; the port reflects the actual binding after
    /// `start` when port 0 was requested
    pub fn local_peer_id(&self) -> PeerId {
        self.local.lock().unwrap().clone()
    }

    /// Short name of the transport in use
    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Bind the listener and run the accept loop.
    ///
    /// Fails with `PortUnavailable` when the requested port is taken.
    /// Idempotent once bound.
    pub async fn start(&self) -> Result<(), MeshError> {
        if self.accept_task.lock().unwrap().is_some() {
            return Ok(());
        }

        let listener = self.transport.bind(&self.local_peer_id()).await?;
        {
            let mut local = self.local.lock().unwrap();
            local.port = listener.local_port();
        }

        let cancel = self.cancel.clone();
        let tx = self.incoming_tx.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = listener.accept() => match result {
                        Ok(pair) => {
                            if tx.send(pair).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::debug!("Accept failed: {e}");
                        }
                    }
                }
            }
        });
        *self.accept_task.lock().unwrap() = Some(handle);
        Ok(())
    }

    /// Close the listener, cancel the accept loop, and close every
    /// connection
    pub async fn stop(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.accept_task.lock().unwrap().take() {
            handle.abort();
        }
        let peers: Vec<PeerId> = self.connected_peers();
        for peer in peers {
            self.disconnect(&peer).await;
        }
    }

    /// Dial a peer and register the connection under its self-reported
    /// identity. Idempotent when a connection for `peer` already exists.
    pub async fn connect(
        &self,
        peer: &PeerId,
    ) -> Result<(PeerId, Arc<dyn Connection>), MeshError> {
        if let Some(conn) = self.connections.get(peer) {
            return Ok((peer.clone(), Arc::clone(&conn)));
        }
        let (reported, conn) = self
            .transport
            .dial(&self.local_peer_id(), peer)
            .await?;
        if let Some(existing) = self.connections.get(&reported) {
            // Lost a dial race; keep the incumbent
            conn.close().await;
            return Ok((reported.clone(), Arc::clone(&existing)));
        }
        self.connections.insert(reported.clone(), Arc::clone(&conn));
        Ok((reported, conn))
    }

    /// Register an inbound connection so calls can route back over it
    pub fn adopt(&self, peer: PeerId, conn: Arc<dyn Connection>) {
        if let Some(old) = self.connections.insert(peer, conn) {
            tokio::spawn(async move {
                old.close().await;
            });
        }
    }

    /// Remove and close the connection for a peer
    pub async fn disconnect(&self, peer: &PeerId) {
        if let Some((_, conn)) = self.connections.remove(peer) {
            conn.close().await;
        }
    }

    /// The live connection for a peer, if any
    pub fn transport_for(&self, peer: &PeerId) -> Option<Arc<dyn Connection>> {
        self.connections.get(peer).map(|r| Arc::clone(&r))
    }

    /// Peers with a live connection
    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.connections.iter().map(|r| r.key().clone()).collect()
    }

    /// Take the single-consumer sequence of accepted `(peer, connection)`
    /// pairs. Returns `None` after the first call.
    pub fn take_incoming(&self) -> Option<mpsc::Receiver<(PeerId, Arc<dyn Connection>)>> {
        self.incoming_rx.lock().unwrap().take()
    }
}
