//! Dispatch-table helpers shared by actor implementations

use serde::Serialize;

use mm_core::MeshError;
use mm_protocol::{CallResult, ProtocolError};

/// Encode a method return value as a successful call result
pub fn success_value<T: Serialize>(value: &T) -> Result<CallResult, MeshError> {
    let payload = serde_json::to_vec(value).map_err(ProtocolError::from)?;
    Ok(CallResult::Success(payload))
}

/// The failure every dispatch table returns for a target it does not know
pub fn unknown_target(target: &str) -> MeshError {
    MeshError::ExecutionFailed {
        target: target.to_string(),
        message: "unknown method".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_value_encodes_json() {
        let result = success_value(&true).unwrap();
        assert_eq!(result, CallResult::Success(b"true".to_vec()));
    }

    #[test]
    fn test_unknown_target_names_the_target() {
        let err = unknown_target("Member.nope:1");
        assert!(matches!(
            err,
            MeshError::ExecutionFailed { target, .. } if target == "Member.nope:1"
        ));
    }
}
