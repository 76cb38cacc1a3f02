//! Peer identity type

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// Identity of a peer in the mesh, addressable as `name@host:port`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerId {
    /// Human-readable peer name
    pub name: String,
    /// Host the peer listens on
    pub host: String,
    /// Listening port
    pub port: u16,
}

impl PeerId {
    /// Create a new peer id
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
        }
    }

    /// Placeholder identity for dialing an endpoint whose name is not yet
    /// known; the handshake replaces it with the remote's self-report.
    pub fn unnamed(host: impl Into<String>, port: u16) -> Self {
        Self::new("?", host, port)
    }

    /// The `host:port` endpoint portion
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Copy of this id with a different port
    pub fn with_port(&self, port: u16) -> Self {
        Self {
            name: self.name.clone(),
            host: self.host.clone(),
            port,
        }
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.name, self.host, self.port)
    }
}

impl FromStr for PeerId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, endpoint) = s
            .split_once('@')
            .ok_or_else(|| ProtocolError::InvalidPeerId(s.to_string()))?;
        let (host, port) = endpoint
            .rsplit_once(':')
            .ok_or_else(|| ProtocolError::InvalidPeerId(s.to_string()))?;
        if name.is_empty() || host.is_empty() {
            return Err(ProtocolError::InvalidPeerId(s.to_string()));
        }
        let port: u16 = port
            .parse()
            .map_err(|_| ProtocolError::InvalidPeerId(s.to_string()))?;
        Ok(Self::new(name, host, port))
    }
}

impl Serialize for PeerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PeerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id_roundtrip() {
        let peer = PeerId::new("alice", "127.0.0.1", 50051);
        assert_eq!(peer.to_string(), "alice@127.0.0.1:50051");

        let parsed: PeerId = "alice@127.0.0.1:50051".parse().unwrap();
        assert_eq!(parsed, peer);
    }

    #[test]
    fn test_peer_id_missing_at() {
        let result: Result<PeerId, _> = "alice:50051".parse();
        assert!(matches!(result, Err(ProtocolError::InvalidPeerId(_))));
    }

    #[test]
    fn test_peer_id_missing_colon() {
        let result: Result<PeerId, _> = "alice@localhost".parse();
        assert!(matches!(result, Err(ProtocolError::InvalidPeerId(_))));
    }

    #[test]
    fn test_peer_id_bad_port() {
        let result: Result<PeerId, _> = "alice@localhost:notaport".parse();
        assert!(matches!(result, Err(ProtocolError::InvalidPeerId(_))));
    }

    #[test]
    fn test_peer_id_equality_over_all_fields() {
        let a = PeerId::new("a", "localhost", 1);
        assert_ne!(a, PeerId::new("b", "localhost", 1));
        assert_ne!(a, PeerId::new("a", "otherhost", 1));
        assert_ne!(a, PeerId::new("a", "localhost", 2));
        assert_eq!(a, PeerId::new("a", "localhost", 1));
    }

    #[test]
    fn test_peer_id_serde_as_string() {
        let peer = PeerId::new("carol", "10.0.0.2", 9000);
        let json = serde_json::to_string(&peer).unwrap();
        assert_eq!(json, "\"carol@10.0.0.2:9000\"");
        let back: PeerId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, peer);
    }
}
