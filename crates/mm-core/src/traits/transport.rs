//! Byte transport seam
//!
//! A transport carries framed envelopes between peers. Any implementation
//! that preserves message boundaries and bidirectional delivery fits; the
//! reference is length-prefixed frames over TCP.

use async_trait::async_trait;
use std::sync::Arc;

use mm_protocol::{Frame, PeerId};

use crate::error::MeshError;

/// A live duplex connection carrying frames
#[async_trait]
pub trait Connection: Send + Sync {
    /// Send one frame. Implementations serialize concurrent senders
    /// internally; frames are delivered in send order.
    async fn send(&self, frame: Frame) -> Result<(), MeshError>;

    /// Receive the next frame. `None` means the stream ended cleanly.
    /// Intended for a single reader task per connection.
    async fn recv(&self) -> Result<Option<Frame>, MeshError>;

    /// Close the connection
    async fn close(&self);
}

/// A bound listening socket producing handshaken connections
#[async_trait]
pub trait Listener: Send + Sync {
    /// The port actually bound (differs from the requested port when 0)
    fn local_port(&self) -> u16;

    /// Accept one inbound connection; the returned peer id is the
    /// remote's self-reported identity from the handshake
    async fn accept(&self) -> Result<(PeerId, Arc<dyn Connection>), MeshError>;
}

/// Factory for listeners and outbound connections
#[async_trait]
pub trait Transport: Send + Sync {
    /// Bind a listener at the host and port of `local`; fails with
    /// `PortUnavailable` when the requested port is taken
    async fn bind(&self, local: &PeerId) -> Result<Box<dyn Listener>, MeshError>;

    /// Dial the remote endpoint and run the identity handshake. Returns
    /// the remote's self-reported identity with the connection.
    async fn dial(
        &self,
        local: &PeerId,
        remote: &PeerId,
    ) -> Result<(PeerId, Arc<dyn Connection>), MeshError>;

    /// Short transport name for diagnostics, e.g. `tcp`
    fn name(&self) -> &'static str;
}
