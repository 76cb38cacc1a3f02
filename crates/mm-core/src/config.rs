//! Mesh configuration
//!
//! Loaded from `~/.config/mm/config.toml` when present; every field has a
//! default and CLI flags override field by field.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::MeshError;

/// Default listening port for a join session
pub const DEFAULT_PORT: u16 = 50051;

/// Default listening host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default remote-call deadline in seconds
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;

/// Configuration for a mesh process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Peer name (defaults to the hostname when unset)
    pub name: Option<String>,

    /// Host to listen on
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Command to run inside the PTY (defaults to `$SHELL`, then `/bin/zsh`)
    pub default_command: Option<String>,

    /// Seed peers to dial on startup, as `name@host:port`
    pub peers: Vec<String>,

    /// Remote-call deadline in seconds
    pub call_timeout_secs: u64,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            name: None,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            default_command: None,
            peers: vec![],
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
        }
    }
}

impl MeshConfig {
    /// Default location of the config file
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_default()
            .join("mm")
            .join("config.toml")
    }

    /// Load from a specific file
    pub fn load_from(path: &Path) -> Result<Self, MeshError> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| {
            MeshError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("{}: {e}", path.display()),
            ))
        })
    }

    /// Load from the default location, falling back to defaults when the
    /// file does not exist or does not parse
    pub fn load() -> Self {
        let path = Self::default_path();
        if !path.exists() {
            return Self::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            tracing::warn!("Ignoring config at {}: {e}", path.display());
            Self::default()
        })
    }

    /// The command a join session runs when none is given on the command
    /// line: the configured default, then `$SHELL`, then `/bin/zsh`
    pub fn join_command(&self) -> String {
        self.default_command
            .clone()
            .or_else(|| std::env::var("SHELL").ok())
            .unwrap_or_else(|| "/bin/zsh".to_string())
    }
}
