//! Member: a distributed actor wrapping a PTY

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use mm_core::{ActorHandler, MemberInfo, MeshError, Pty};
use mm_protocol::{ActorId, ArgumentList, CallResult};

use crate::actor::{success_value, unknown_target};
use crate::system::CommunitySystem;

pub const TARGET_MEMBER_TELL: &str = "Member.tell:1";
pub const TARGET_MEMBER_IS_RUNNING: &str = "Member.is_running:1";
pub const TARGET_MEMBER_GET_NAME: &str = "Member.get_name:1";
pub const TARGET_MEMBER_GET_COMMAND: &str = "Member.get_command:1";
pub const TARGET_MEMBER_GET_CWD: &str = "Member.get_cwd:1";
pub const TARGET_MEMBER_GET_FOREGROUND: &str = "Member.get_foreground_process:1";

/// Pause between the told text and the carriage return, so full-screen
/// programs see the text before the newline arrives
const DEFAULT_WRITE_DELAY: Duration = Duration::from_millis(10);

/// A named actor that injects text into a PTY as if typed at the keyboard
pub struct Member {
    name: String,
    id: ActorId,
    pty: Arc<dyn Pty>,
    owns_pty: bool,
    transport: String,
    write_delay: Duration,
}

impl Member {
    /// Create a member wrapping a PTY.
    ///
    /// When `owns_pty` is set, resigning the member closes the PTY; the
    /// interactive join session keeps ownership itself and passes `false`.
    pub fn new(
        name: impl Into<String>,
        id: ActorId,
        pty: Arc<dyn Pty>,
        owns_pty: bool,
        transport: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            id,
            pty,
            owns_pty,
            transport: transport.into(),
            write_delay: DEFAULT_WRITE_DELAY,
        }
    }

    /// Override the pause between the text and the carriage return
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    /// The registered name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type the text into the PTY, then press enter
    pub async fn tell(&self, text: &str) -> Result<(), MeshError> {
        self.pty.write_raw(text.as_bytes())?;
        tokio::time::sleep(self.write_delay).await;
        self.pty.write_raw(b"\r")
    }

    /// Whether the wrapped process is still alive
    pub fn is_running(&self) -> bool {
        self.pty.is_running()
    }
}

#[async_trait]
impl ActorHandler for Member {
    fn actor_id(&self) -> &ActorId {
        &self.id
    }

    async fn dispatch(&self, target: &str, args: &ArgumentList) -> Result<CallResult, MeshError> {
        match target {
            TARGET_MEMBER_TELL => {
                let text: String = args.reader().next()?;
                self.tell(&text).await?;
                Ok(CallResult::Void)
            }
            TARGET_MEMBER_IS_RUNNING => success_value(&self.is_running()),
            TARGET_MEMBER_GET_NAME => success_value(&self.name),
            TARGET_MEMBER_GET_COMMAND => success_value(&self.pty.command()),
            TARGET_MEMBER_GET_CWD => success_value(&self.pty.cwd()),
            TARGET_MEMBER_GET_FOREGROUND => success_value(&self.pty.foreground_process()),
            _ => Err(unknown_target(target)),
        }
    }

    fn info(&self) -> Option<MemberInfo> {
        Some(MemberInfo {
            name: self.name.clone(),
            actor_id: self.id.clone(),
            peer_id: self.id.peer.clone(),
            transport: self.transport.clone(),
            command: self.pty.command(),
            cwd: self.pty.cwd(),
            foreground_process: self.pty.foreground_process(),
        })
    }

    fn resign(&self) {
        if self.owns_pty {
            self.pty.close();
        }
    }
}

/// Proxy for a member that may live on any peer.
///
/// Method calls encode their arguments and route through the call
/// runtime; for members on the local peer the dispatch short-circuits.
#[derive(Clone)]
pub struct MemberRef {
    system: CommunitySystem,
    id: ActorId,
}

impl std::fmt::Debug for MemberRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberRef").field("id", &self.id).finish()
    }
}

impl MemberRef {
    pub fn new(system: CommunitySystem, id: ActorId) -> Self {
        Self { system, id }
    }

    /// The member's actor id
    pub fn id(&self) -> &ActorId {
        &self.id
    }

    /// Type text into the member's PTY and press enter
    pub async fn tell(&self, text: &str) -> Result<(), MeshError> {
        self.system
            .remote_call_void(&self.id, TARGET_MEMBER_TELL, ArgumentList::of(&text)?)
            .await
    }

    /// Whether the member's process is still alive
    pub async fn is_running(&self) -> Result<bool, MeshError> {
        self.system
            .remote_call(&self.id, TARGET_MEMBER_IS_RUNNING, ArgumentList::new())
            .await
    }

    /// The member's registered name
    pub async fn get_name(&self) -> Result<String, MeshError> {
        self.system
            .remote_call(&self.id, TARGET_MEMBER_GET_NAME, ArgumentList::new())
            .await
    }

    /// The command line running inside the PTY, when known
    pub async fn get_command(&self) -> Result<Option<String>, MeshError> {
        self.system
            .remote_call(&self.id, TARGET_MEMBER_GET_COMMAND, ArgumentList::new())
            .await
    }

    /// The PTY child's working directory, when known
    pub async fn get_cwd(&self) -> Result<Option<String>, MeshError> {
        self.system
            .remote_call(&self.id, TARGET_MEMBER_GET_CWD, ArgumentList::new())
            .await
    }

    /// The process in the foreground of the PTY, when known
    pub async fn get_foreground_process(&self) -> Result<Option<String>, MeshError> {
        self.system
            .remote_call(&self.id, TARGET_MEMBER_GET_FOREGROUND, ArgumentList::new())
            .await
    }

    /// Unregister the member from its system
    pub async fn resign(&self) {
        self.system.resign_id(&self.id).await;
    }
}
