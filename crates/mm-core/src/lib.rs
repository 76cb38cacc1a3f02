//! mm-core: Core abstractions for the mm mesh
//!
//! This crate provides the error taxonomy, the actor and name registries,
//! the trait seams consumed by the distributed-call runtime (PTY,
//! transport, actor dispatch), and configuration.

pub mod config;
pub mod error;
pub mod registry;
pub mod traits;
pub mod types;

pub use config::MeshConfig;
pub use error::MeshError;
pub use registry::{ActorRegistry, NameRegistry};
pub use traits::actor::ActorHandler;
pub use traits::pty::Pty;
pub use traits::transport::{Connection, Listener, Transport};
pub use types::MemberInfo;
