//! Argument payload encoding
//!
//! Arguments travel inside the invocation envelope as a length-prefixed
//! sequence of JSON-encoded values: a u32 count, then for each value a u32
//! length and the value bytes, all big-endian. JSON keeps the payload
//! self-describing so any serde type round-trips without a schema.

use bytes::{Buf, BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ProtocolError;

/// An ordered sequence of encoded argument values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentList {
    parts: Vec<Vec<u8>>,
}

impl ArgumentList {
    /// Create an empty argument list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one argument value
    pub fn push<T: Serialize>(&mut self, value: &T) -> Result<(), ProtocolError> {
        self.parts.push(serde_json::to_vec(value)?);
        Ok(())
    }

    /// Convenience constructor for a single-argument list
    pub fn of<T: Serialize>(value: &T) -> Result<Self, ProtocolError> {
        let mut args = Self::new();
        args.push(value)?;
        Ok(args)
    }

    /// Number of arguments
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Encode to the wire form carried in `InvocationEnvelope::arguments`
    pub fn encode(&self) -> Vec<u8> {
        let total: usize = self.parts.iter().map(|p| 4 + p.len()).sum();
        let mut buf = BytesMut::with_capacity(4 + total);
        buf.put_u32(self.parts.len() as u32);
        for part in &self.parts {
            buf.put_u32(part.len() as u32);
            buf.put_slice(part);
        }
        buf.to_vec()
    }

    /// Decode from the wire form
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut src = bytes;
        if src.remaining() < 4 {
            return Err(ProtocolError::MalformedFrame(
                "argument list truncated before count".to_string(),
            ));
        }
        let count = src.get_u32() as usize;
        let mut parts = Vec::with_capacity(count);
        for index in 0..count {
            if src.remaining() < 4 {
                return Err(ProtocolError::MalformedFrame(format!(
                    "argument {index} truncated before length"
                )));
            }
            let len = src.get_u32() as usize;
            if src.remaining() < len {
                return Err(ProtocolError::MalformedFrame(format!(
                    "argument {index} truncated: expected {len} bytes, got {}",
                    src.remaining()
                )));
            }
            parts.push(src.copy_to_bytes(len).to_vec());
        }
        Ok(Self { parts })
    }

    /// Sequential reader over the decoded values
    pub fn reader(&self) -> ArgumentReader<'_> {
        ArgumentReader {
            parts: &self.parts,
            index: 0,
        }
    }
}

/// Decodes argument values in invocation order
pub struct ArgumentReader<'a> {
    parts: &'a [Vec<u8>],
    index: usize,
}

impl ArgumentReader<'_> {
    /// Decode the next argument into the declared parameter type
    pub fn next<T: DeserializeOwned>(&mut self) -> Result<T, ProtocolError> {
        let part = self.parts.get(self.index).ok_or_else(|| {
            ProtocolError::MalformedFrame(format!(
                "argument {} missing: only {} provided",
                self.index,
                self.parts.len()
            ))
        })?;
        self.index += 1;
        Ok(serde_json::from_slice(part)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arguments_roundtrip_in_order() {
        let mut args = ArgumentList::new();
        args.push(&"hello").unwrap();
        args.push(&42u32).unwrap();
        args.push(&vec![1i64, 2, 3]).unwrap();

        let decoded = ArgumentList::decode(&args.encode()).unwrap();
        let mut reader = decoded.reader();
        assert_eq!(reader.next::<String>().unwrap(), "hello");
        assert_eq!(reader.next::<u32>().unwrap(), 42);
        assert_eq!(reader.next::<Vec<i64>>().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_arguments() {
        let args = ArgumentList::new();
        let decoded = ArgumentList::decode(&args.encode()).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_truncated_arguments_rejected() {
        let mut encoded = ArgumentList::of(&"payload").unwrap().encode();
        encoded.truncate(encoded.len() - 2);
        let result = ArgumentList::decode(&encoded);
        assert!(matches!(result, Err(ProtocolError::MalformedFrame(_))));
    }

    #[test]
    fn test_reading_past_end_fails() {
        let args = ArgumentList::of(&1u8).unwrap();
        let mut reader = args.reader();
        let _: u8 = reader.next().unwrap();
        let result: Result<u8, _> = reader.next();
        assert!(matches!(result, Err(ProtocolError::MalformedFrame(_))));
    }
}
