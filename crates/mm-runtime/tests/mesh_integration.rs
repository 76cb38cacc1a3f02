//! End-to-end tests over real TCP on loopback
//!
//! Members wrap a scripted in-memory PTY that records written bytes and
//! republishes them as an output stream, standing in for a `cat` child.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use mm_core::{MeshError, Pty};
use mm_protocol::{ActorId, PeerId, SYSTEM_ACTOR_UUID};
use mm_runtime::{CommunitySystem, PeerNode, TcpTransport};

/// In-memory stand-in for an echoing child process
struct EchoPty {
    written: Mutex<Vec<u8>>,
    chunks: mpsc::UnboundedSender<Vec<u8>>,
    running: AtomicBool,
}

impl EchoPty {
    fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                written: Mutex::new(Vec::new()),
                chunks: tx,
                running: AtomicBool::new(true),
            }),
            rx,
        )
    }

    fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }
}

impl Pty for EchoPty {
    fn write_line(&self, text: &str) -> Result<(), MeshError> {
        self.write_raw(text.as_bytes())?;
        self.write_raw(b"\r")
    }

    fn write_raw(&self, bytes: &[u8]) -> Result<(), MeshError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(MeshError::PtyClosed);
        }
        self.written.lock().unwrap().extend_from_slice(bytes);
        let _ = self.chunks.send(bytes.to_vec());
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn command(&self) -> Option<String> {
        Some("cat".to_string())
    }
}

fn new_system(name: &str) -> CommunitySystem {
    let peer = PeerId::new(name, "127.0.0.1", 0);
    let node = PeerNode::new(peer, Arc::new(TcpTransport::new()));
    CommunitySystem::with_call_timeout(name, node, Duration::from_secs(5))
}

/// Collect output chunks until the needle shows up or the deadline passes
async fn read_stream_until(
    rx: &mut mpsc::UnboundedReceiver<Vec<u8>>,
    needle: &str,
    deadline: Duration,
) -> String {
    let mut collected = String::new();
    let _ = tokio::time::timeout(deadline, async {
        while let Some(chunk) = rx.recv().await {
            collected.push_str(&String::from_utf8_lossy(&chunk));
            if collected.contains(needle) {
                break;
            }
        }
    })
    .await;
    collected
}

#[tokio::test]
async fn test_local_echo() {
    let system = new_system("a");
    system.start().await.unwrap();

    let (pty, mut output) = EchoPty::new();
    let member = system.create_member("m", pty.clone(), false).unwrap();

    member.tell("hello").await.unwrap();

    let seen = read_stream_until(&mut output, "hello", Duration::from_millis(500)).await;
    assert!(seen.contains("hello"));
    assert_eq!(pty.written(), b"hello\r");

    system.stop().await;
}

#[tokio::test]
async fn test_two_node_tell() {
    let a = new_system("a");
    a.start().await.unwrap();
    let (alice_pty, mut alice_output) = EchoPty::new();
    a.create_member("alice", alice_pty, false).unwrap();

    let b = new_system("b");
    b.start().await.unwrap();
    let a_peer = b.connect_to_peer(&a.local_peer_id()).await.unwrap();
    assert_eq!(a_peer, a.local_peer_id());

    let info = b
        .system_ref(a_peer)
        .find_member("alice")
        .await
        .unwrap()
        .expect("alice should be visible from b");
    assert_eq!(info.peer_id, a.local_peer_id());

    b.member_ref(info.actor_id).tell("hi").await.unwrap();

    let seen = read_stream_until(&mut alice_output, "hi", Duration::from_millis(500)).await;
    assert!(seen.contains("hi"));

    b.stop().await;
    a.stop().await;
}

#[tokio::test]
async fn test_list_across_peers() {
    let a = new_system("a");
    a.start().await.unwrap();
    let (alice_pty, _alice_output) = EchoPty::new();
    a.create_member("alice", alice_pty, false).unwrap();

    let c = new_system("c");
    c.start().await.unwrap();
    let (carol_pty, _carol_output) = EchoPty::new();
    c.create_member("carol", carol_pty, false).unwrap();

    let b = new_system("b");
    b.start().await.unwrap();
    b.connect_to_peer(&a.local_peer_id()).await.unwrap();
    b.connect_to_peer(&c.local_peer_id()).await.unwrap();

    let members = b.all_members_with_status().await.unwrap();
    let alice = members.iter().find(|m| m.name == "alice").unwrap();
    let carol = members.iter().find(|m| m.name == "carol").unwrap();
    assert_eq!(alice.peer_id, a.local_peer_id());
    assert_eq!(carol.peer_id, c.local_peer_id());
    assert_eq!(alice.command.as_deref(), Some("cat"));

    b.stop().await;
    c.stop().await;
    a.stop().await;
}

#[tokio::test]
async fn test_duplicate_name_rejected() {
    let system = new_system("a");
    system.start().await.unwrap();

    let (first, _) = EchoPty::new();
    system.create_member("alice", first, false).unwrap();

    let (second, _) = EchoPty::new();
    let err = system.create_member("alice", second, false).unwrap_err();
    assert!(matches!(err, MeshError::NameAlreadyTaken(name) if name == "alice"));

    system.stop().await;
}

#[tokio::test]
async fn test_dead_peer_fails_pending_call_and_clears_members() {
    let a = new_system("a");
    a.start().await.unwrap();
    let (alice_pty, _alice_output) = EchoPty::new();
    a.create_member("alice", alice_pty, false).unwrap();

    let b = new_system("b");
    b.start().await.unwrap();
    let a_peer = b.connect_to_peer(&a.local_peer_id()).await.unwrap();

    let info = b
        .system_ref(a_peer)
        .find_member("alice")
        .await
        .unwrap()
        .unwrap();
    let alice_ref = b.member_ref(info.actor_id);

    // Launch a tell and kill a while the call is in flight (the member's
    // inter-write pause keeps the response from arriving immediately)
    let in_flight = tokio::spawn(async move { alice_ref.tell("hi").await });
    tokio::time::sleep(Duration::from_millis(2)).await;
    a.stop().await;

    let result = tokio::time::timeout(Duration::from_secs(5), in_flight)
        .await
        .expect("awaiter should resolve after the connection drops")
        .unwrap();
    assert!(
        matches!(result, Err(MeshError::ConnectionFailed(_))),
        "got: {result:?}"
    );

    // The departed peer's members are gone from enumeration
    let members = b.all_members_with_status().await.unwrap();
    assert!(members.iter().all(|m| m.name != "alice"));

    b.stop().await;
}

#[tokio::test]
async fn test_start_and_stop_are_idempotent() {
    let system = new_system("a");
    system.start().await.unwrap();
    let port = system.local_peer_id().port;
    system.start().await.unwrap();
    assert_eq!(system.local_peer_id().port, port);

    system.stop().await;
    system.stop().await;

    // Stopping an unstarted system is a no-op
    let fresh = new_system("b");
    fresh.stop().await;
}

#[tokio::test]
async fn test_create_member_requires_started_system() {
    let system = new_system("a");
    let (pty, _) = EchoPty::new();
    let err = system.create_member("m", pty, false).unwrap_err();
    assert!(matches!(err, MeshError::SystemNotStarted));
}

#[tokio::test]
async fn test_resign_clears_registrations() {
    let system = new_system("a");
    system.start().await.unwrap();

    let (pty, _) = EchoPty::new();
    let member = system.create_member("m", pty, false).unwrap();
    let id = member.id().clone();

    member.resign().await;

    assert!(system.resolve(&id).is_none());
    let found = system
        .system_ref(system.local_peer_id())
        .find_member("m")
        .await
        .unwrap();
    assert!(found.is_none());
    let members = system.all_members_with_status().await.unwrap();
    assert!(members.is_empty());

    system.stop().await;
}

#[tokio::test]
async fn test_resign_closes_owned_pty() {
    let system = new_system("a");
    system.start().await.unwrap();

    let (pty, _) = EchoPty::new();
    let member = system.create_member("m", pty.clone(), true).unwrap();
    member.resign().await;
    assert!(!pty.is_running());

    let (pty, _) = EchoPty::new();
    let member = system.create_member("n", pty.clone(), false).unwrap();
    member.resign().await;
    assert!(pty.is_running());

    system.stop().await;
}

#[tokio::test]
async fn test_system_actor_has_well_known_uuid() {
    let system = new_system("a");
    system.start().await.unwrap();

    let id = ActorId::system(system.local_peer_id());
    let actor = system.resolve(&id).expect("system actor must exist");
    assert_eq!(actor.actor_id().uuid, SYSTEM_ACTOR_UUID);

    system.stop().await;
}

#[tokio::test]
async fn test_local_call_matches_direct_invocation() {
    let system = new_system("a");
    system.start().await.unwrap();

    let (pty, _) = EchoPty::new();
    let member = system.create_member("m", pty.clone(), false).unwrap();

    assert_eq!(member.get_name().await.unwrap(), "m");
    assert!(member.is_running().await.unwrap());
    assert_eq!(member.get_command().await.unwrap().as_deref(), Some("cat"));
    assert_eq!(member.get_cwd().await.unwrap(), pty.cwd());

    pty.close();
    assert!(!member.is_running().await.unwrap());

    system.stop().await;
}

#[tokio::test]
async fn test_call_to_unknown_actor_fails_actor_not_found() {
    let a = new_system("a");
    a.start().await.unwrap();

    let b = new_system("b");
    b.start().await.unwrap();
    let a_peer = b.connect_to_peer(&a.local_peer_id()).await.unwrap();

    let ghost = b.member_ref(ActorId::new("no-such-uuid", a_peer));
    let err = ghost.tell("hi").await.unwrap_err();
    assert!(matches!(err, MeshError::ActorNotFound(uuid) if uuid == "no-such-uuid"));

    b.stop().await;
    a.stop().await;
}

#[tokio::test]
async fn test_call_to_unconnected_peer_fails_peer_not_found() {
    let a = new_system("a");
    a.start().await.unwrap();

    let stranger = PeerId::new("stranger", "127.0.0.1", 1);
    let ghost = a.member_ref(ActorId::new("u", stranger.clone()));
    let err = ghost.tell("hi").await.unwrap_err();
    assert!(matches!(err, MeshError::PeerNotFound(p) if p == stranger));

    a.stop().await;
}

#[tokio::test]
async fn test_tell_closed_pty_surfaces_execution_failure() {
    let a = new_system("a");
    a.start().await.unwrap();
    let (pty, _) = EchoPty::new();
    a.create_member("alice", pty.clone(), false).unwrap();
    pty.close();

    let b = new_system("b");
    b.start().await.unwrap();
    let a_peer = b.connect_to_peer(&a.local_peer_id()).await.unwrap();
    let info = b
        .system_ref(a_peer)
        .find_member("alice")
        .await
        .unwrap()
        .unwrap();

    let err = b.member_ref(info.actor_id).tell("hi").await.unwrap_err();
    assert!(matches!(err, MeshError::ExecutionFailed { .. }), "got: {err:?}");

    b.stop().await;
    a.stop().await;
}

#[tokio::test]
async fn test_remote_shutdown_takes_peer_out_of_the_mesh() {
    let a = new_system("a");
    a.start().await.unwrap();

    let b = new_system("b");
    b.start().await.unwrap();
    let a_peer = b.connect_to_peer(&a.local_peer_id()).await.unwrap();

    b.system_ref(a_peer.clone()).shutdown().await.unwrap();

    // The shutdown acknowledges first and stops shortly after
    tokio::time::sleep(Duration::from_millis(300)).await;
    let err = b
        .system_ref(a_peer)
        .list_members()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MeshError::PeerNotFound(_) | MeshError::ConnectionFailed(_) | MeshError::Timeout
    ));

    b.stop().await;
}
