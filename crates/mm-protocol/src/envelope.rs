//! Invocation and response envelopes

use serde::{Deserialize, Serialize};

/// A method invocation addressed to an actor on some peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationEnvelope {
    /// Fresh v4 uuid correlating the response to this invocation
    pub call_id: String,
    /// Uuid of the actor the call is addressed to
    pub recipient_uuid: String,
    /// Canonical peer id of the caller
    pub sender_peer: String,
    /// Opaque method identifier, e.g. `Member.tell:1`
    pub target: String,
    /// Encoded argument sequence, in invocation order
    pub arguments: Vec<u8>,
}

/// The response to a single invocation, matched by `call_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Echo of the invocation's call id
    pub call_id: String,
    /// Outcome of the call
    pub result: CallResult,
}

impl ResponseEnvelope {
    /// A successful void response
    pub fn void(call_id: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            result: CallResult::Void,
        }
    }

    /// A successful response carrying an encoded return value
    pub fn success(call_id: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            call_id: call_id.into(),
            result: CallResult::Success(payload),
        }
    }

    /// A failed response
    pub fn failure(call_id: impl Into<String>, error: RuntimeError) -> Self {
        Self {
            call_id: call_id.into(),
            result: CallResult::Failure(error),
        }
    }
}

/// Outcome of a dispatched call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CallResult {
    /// The method returned unit
    Void,
    /// The method returned a value, encoded as a JSON payload
    Success(Vec<u8>),
    /// The call failed on the remote side
    Failure(RuntimeError),
}

/// Failure raised while dispatching an invocation on the receiving peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RuntimeErrorRepr", into = "RuntimeErrorRepr")]
pub enum RuntimeError {
    /// No actor holds the recipient uuid on the receiving peer
    ActorNotFound { uuid: String },
    /// The method ran but raised, or the target was unknown
    ExecutionFailed { target: String, message: String },
}

const TAG_ACTOR_NOT_FOUND: u8 = 0x01;
const TAG_EXECUTION_FAILED: u8 = 0x02;

/// Tagged wire representation; tolerates tags from newer peers
#[derive(Serialize, Deserialize)]
struct RuntimeErrorRepr {
    tag: u8,
    first: String,
    second: String,
}

impl From<RuntimeError> for RuntimeErrorRepr {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::ActorNotFound { uuid } => Self {
                tag: TAG_ACTOR_NOT_FOUND,
                first: uuid,
                second: String::new(),
            },
            RuntimeError::ExecutionFailed { target, message } => Self {
                tag: TAG_EXECUTION_FAILED,
                first: target,
                second: message,
            },
        }
    }
}

impl From<RuntimeErrorRepr> for RuntimeError {
    fn from(repr: RuntimeErrorRepr) -> Self {
        match repr.tag {
            TAG_ACTOR_NOT_FOUND => RuntimeError::ActorNotFound { uuid: repr.first },
            TAG_EXECUTION_FAILED => RuntimeError::ExecutionFailed {
                target: repr.first,
                message: repr.second,
            },
            _ => RuntimeError::ExecutionFailed {
                target: repr.first,
                message: "unknown error tag".to_string(),
            },
        }
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeError::ActorNotFound { uuid } => write!(f, "actor not found: {uuid}"),
            RuntimeError::ExecutionFailed { target, message } => {
                write!(f, "{target} failed: {message}")
            }
        }
    }
}
