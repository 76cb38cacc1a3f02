//! mm-protocol: Wire protocol for the mm mesh
//!
//! This crate defines peer and actor identity, the invocation/response
//! envelopes, argument payload encoding, and the length-prefixed frame
//! codec spoken between peers.

pub mod actor;
pub mod args;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod frame;
pub mod peer;

pub use actor::{ActorId, SYSTEM_ACTOR_UUID};
pub use args::{ArgumentList, ArgumentReader};
pub use codec::FrameCodec;
pub use envelope::{CallResult, InvocationEnvelope, ResponseEnvelope, RuntimeError};
pub use error::ProtocolError;
pub use frame::{decode_frame, encode_frame, Frame, LENGTH_PREFIX_SIZE, MAX_PAYLOAD_SIZE};
pub use peer::PeerId;
