//! Wire frames
//!
//! Every message on a connection is a single frame: a u32 big-endian
//! payload length followed by the bincode-encoded `Frame` payload. The
//! bincode enum discriminator distinguishes the variants.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::envelope::{InvocationEnvelope, ResponseEnvelope};
use crate::error::ProtocolError;
use crate::peer::PeerId;

/// Size of the length prefix in bytes
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: usize = 0x0100_0000;

/// A single message on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Frame {
    /// Identity handshake: each side declares its own peer id on connect
    Hello(PeerId),
    /// A method invocation
    Invocation(InvocationEnvelope),
    /// The response to an earlier invocation on this connection
    Response(ResponseEnvelope),
}

/// Encode a frame to its full wire form, length prefix included
pub fn encode_frame(frame: &Frame) -> Result<Bytes, ProtocolError> {
    let payload = bincode::serialize(frame)?;
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.put_slice(&payload);
    Ok(buf.freeze())
}

/// Decode a frame from its full wire form, length prefix included
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, ProtocolError> {
    if bytes.len() < LENGTH_PREFIX_SIZE {
        return Err(ProtocolError::MalformedFrame(
            "frame shorter than length prefix".to_string(),
        ));
    }
    let len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let payload = &bytes[LENGTH_PREFIX_SIZE..];
    if payload.len() != len {
        return Err(ProtocolError::MalformedFrame(format!(
            "length prefix says {len} bytes, payload has {}",
            payload.len()
        )));
    }
    bincode::deserialize(payload).map_err(|e| ProtocolError::MalformedFrame(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{CallResult, RuntimeError};

    fn sample_frames() -> Vec<Frame> {
        vec![
            Frame::Hello(PeerId::new("alice", "127.0.0.1", 50051)),
            Frame::Invocation(InvocationEnvelope {
                call_id: "call-1".to_string(),
                recipient_uuid: "uuid-1".to_string(),
                sender_peer: "bob@127.0.0.1:50052".to_string(),
                target: "Member.tell:1".to_string(),
                arguments: vec![0, 0, 0, 0],
            }),
            Frame::Response(ResponseEnvelope {
                call_id: "call-1".to_string(),
                result: CallResult::Void,
            }),
            Frame::Response(ResponseEnvelope {
                call_id: "call-2".to_string(),
                result: CallResult::Success(b"\"ok\"".to_vec()),
            }),
            Frame::Response(ResponseEnvelope {
                call_id: "call-3".to_string(),
                result: CallResult::Failure(RuntimeError::ActorNotFound {
                    uuid: "uuid-9".to_string(),
                }),
            }),
        ]
    }

    #[test]
    fn test_frame_roundtrip() {
        for frame in sample_frames() {
            let bytes = encode_frame(&frame).unwrap();
            let back = decode_frame(&bytes).unwrap();
            assert_eq!(back, frame);
        }
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let frame = Frame::Hello(PeerId::new("a", "h", 1));
        let mut bytes = encode_frame(&frame).unwrap().to_vec();
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(
            decode_frame(&bytes),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_garbage_payload_rejected() {
        let mut bytes = vec![0, 0, 0, 4];
        bytes.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(matches!(
            decode_frame(&bytes),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }
}
