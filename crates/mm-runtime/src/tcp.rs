//! TCP transport
//!
//! Length-prefixed frames over a `TcpStream`. On connect, the dialer
//! sends a `Hello` frame declaring its peer id and the acceptor replies
//! with its own; the self-reported identity keys all later bookkeeping.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_util::codec::Framed;

use mm_core::{Connection, Listener, MeshError, Transport};
use mm_protocol::{Frame, FrameCodec, PeerId};

/// Deadline for establishing an outbound TCP connection
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline for the identity handshake on a fresh connection
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Transport speaking length-prefixed frames over TCP
#[derive(Debug, Default)]
pub struct TcpTransport;

impl TcpTransport {
    /// Create the transport
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn bind(&self, local: &PeerId) -> Result<Box<dyn Listener>, MeshError> {
        let listener = TcpListener::bind(local.endpoint()).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                MeshError::PortUnavailable(local.port)
            } else {
                MeshError::Io(e)
            }
        })?;
        let port = listener.local_addr()?.port();
        tracing::debug!("Listening on {}:{port}", local.host);
        Ok(Box::new(TcpFrameListener {
            listener,
            local: local.with_port(port),
        }))
    }

    async fn dial(
        &self,
        local: &PeerId,
        remote: &PeerId,
    ) -> Result<(PeerId, Arc<dyn Connection>), MeshError> {
        let stream = tokio::time::timeout(DIAL_TIMEOUT, TcpStream::connect(remote.endpoint()))
            .await
            .map_err(|_| MeshError::ConnectionTimeout)?
            .map_err(|e| {
                MeshError::ConnectionFailed(format!("dial {}: {e}", remote.endpoint()))
            })?;
        let conn = TcpConnection::new(stream);
        conn.send(Frame::Hello(local.clone())).await?;
        let reported = recv_hello(&conn).await?;
        tracing::debug!("Connected to {reported}");
        Ok((reported, Arc::new(conn)))
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}

/// A bound TCP listener producing handshaken connections
pub struct TcpFrameListener {
    listener: TcpListener,
    local: PeerId,
}

#[async_trait]
impl Listener for TcpFrameListener {
    fn local_port(&self) -> u16 {
        self.local.port
    }

    async fn accept(&self) -> Result<(PeerId, Arc<dyn Connection>), MeshError> {
        let (stream, addr) = self.listener.accept().await?;
        let conn = TcpConnection::new(stream);
        let reported = recv_hello(&conn).await?;
        conn.send(Frame::Hello(self.local.clone())).await?;
        tracing::debug!("Accepted {reported} from {addr}");
        Ok((reported, Arc::new(conn)))
    }
}

/// Read the remote's identity frame, bounded by the handshake deadline
async fn recv_hello(conn: &TcpConnection) -> Result<PeerId, MeshError> {
    match tokio::time::timeout(HANDSHAKE_TIMEOUT, conn.recv()).await {
        Ok(Ok(Some(Frame::Hello(peer)))) => Ok(peer),
        Ok(Ok(Some(_))) => Err(MeshError::ConnectionFailed(
            "expected identity handshake".to_string(),
        )),
        Ok(Ok(None)) => Err(MeshError::ConnectionFailed(
            "connection closed during handshake".to_string(),
        )),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(MeshError::ConnectionTimeout),
    }
}

/// A live TCP connection.
///
/// The sink half is guarded so any task may send; the stream half is
/// consumed by the single per-connection read loop.
pub struct TcpConnection {
    sink: Mutex<SplitSink<Framed<TcpStream, FrameCodec>, Frame>>,
    stream: Mutex<SplitStream<Framed<TcpStream, FrameCodec>>>,
}

impl TcpConnection {
    fn new(stream: TcpStream) -> Self {
        let framed = Framed::new(stream, FrameCodec::new());
        let (sink, stream) = framed.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }
    }
}

#[async_trait]
impl Connection for TcpConnection {
    async fn send(&self, frame: Frame) -> Result<(), MeshError> {
        let mut sink = self.sink.lock().await;
        sink.send(frame).await?;
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Frame>, MeshError> {
        let mut stream = self.stream.lock().await;
        match stream.next().await {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    async fn close(&self) {
        let mut sink = self.sink.lock().await;
        let _ = sink.close().await;
    }
}
