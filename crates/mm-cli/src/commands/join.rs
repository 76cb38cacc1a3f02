//! Join command: run an interactive member session
//!
//! Binds the mesh listener, spawns the command inside a PTY, registers it
//! as a member, and forwards keystrokes in raw mode until the process
//! exits or the user detaches with Ctrl+].

use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use mm_core::{MeshConfig, MeshError, Pty};
use mm_protocol::PeerId;
use mm_pty::PtyProcess;
use mm_runtime::{CommunitySystem, PeerNode, TcpTransport};

use crate::output::{print_info, print_warning};

/// Arguments to `mm join`
pub struct JoinArgs {
    pub command: Option<String>,
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub peers: Vec<String>,
    pub no_discovery: bool,
}

/// Run an interactive member session until detach or process exit
pub async fn join_command(config: &MeshConfig, args: JoinArgs) -> Result<()> {
    let name = args
        .name
        .or_else(|| config.name.clone())
        .unwrap_or_else(|| gethostname::gethostname().to_string_lossy().into_owned());
    let host = args.host.unwrap_or_else(|| config.host.clone());
    let port = args.port.unwrap_or(config.port);
    let command = args.command.unwrap_or_else(|| config.join_command());

    let (system, attach_seed) = match start_system(&name, &host, port).await {
        Ok(system) => (system, None),
        Err(e) => match attach_fallback(&host, port, &e) {
            Some(seed) => {
                print_info(&format!(
                    "Port {port} is busy; rebinding and joining the mesh already on it"
                ));
                (start_system(&name, &host, 0).await?, Some(seed))
            }
            None => return Err(e.into()),
        },
    };

    let pty = Arc::new(
        PtyProcess::spawn(&command, &[], &[("MM_NAME".to_string(), name.clone())])
            .with_context(|| format!("Failed to spawn {command}"))?,
    );
    // The session keeps PTY ownership; resigning the member must not
    // tear down the terminal under our feet
    let member = system.create_member(&name, pty.clone(), false)?;

    if let Some(seed) = attach_seed {
        if let Err(e) = system.connect_to_peer(&seed).await {
            print_warning(&format!("Could not attach to {}: {e}", seed.endpoint()));
        }
    }
    for spec in args.peers.iter().chain(config.peers.iter()) {
        match spec.parse::<PeerId>() {
            Ok(peer) => {
                if let Err(e) = system.connect_to_peer(&peer).await {
                    print_warning(&format!("Could not reach {peer}: {e}"));
                }
            }
            Err(e) => print_warning(&format!("Skipping peer {spec:?}: {e}")),
        }
    }
    if args.no_discovery {
        tracing::debug!("Peer discovery disabled");
    }

    print_info(&format!(
        "Joined as {name} at {}; press Ctrl+] to leave",
        system.local_peer_id()
    ));

    let session = run_session(&pty).await;

    member.resign().await;
    system.stop().await;
    pty.close();
    session
}

async fn start_system(name: &str, host: &str, port: u16) -> Result<CommunitySystem, MeshError> {
    let node = PeerNode::new(
        PeerId::new(name, host, port),
        Arc::new(TcpTransport::new()),
    );
    let system = CommunitySystem::new(name, node);
    system.start().await?;
    Ok(system)
}

/// When the default port is taken, a second join rebinds to an ephemeral
/// port and attaches to the incumbent server instead of failing
fn attach_fallback(host: &str, requested: u16, err: &MeshError) -> Option<PeerId> {
    match err {
        MeshError::PortUnavailable(p)
            if *p == requested && requested == mm_core::config::DEFAULT_PORT =>
        {
            Some(PeerId::unnamed(host, requested))
        }
        _ => None,
    }
}

/// Raw-mode terminal loop: keystrokes to the PTY, PTY output to stdout
async fn run_session(pty: &Arc<PtyProcess>) -> Result<()> {
    use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
    use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

    let mut output = pty
        .take_output()
        .context("PTY output stream already taken")?;
    enable_raw_mode()?;

    let pump = tokio::spawn(async move {
        let mut stdout = std::io::stdout();
        while let Some(chunk) = output.recv().await {
            if stdout
                .write_all(&chunk)
                .and_then(|_| stdout.flush())
                .is_err()
            {
                break;
            }
        }
    });

    let result: Result<()> = loop {
        if !pty.is_running() {
            break Ok(());
        }
        match event::poll(Duration::from_millis(100)) {
            Ok(false) => continue,
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) => {
                    if key.kind == KeyEventKind::Release {
                        continue;
                    }
                    // Ctrl+] detaches
                    if key.modifiers.contains(KeyModifiers::CONTROL)
                        && key.code == KeyCode::Char(']')
                    {
                        break Ok(());
                    }
                    if let Some(bytes) = encode_key(key.code, key.modifiers) {
                        if pty.write_raw(&bytes).is_err() {
                            break Ok(());
                        }
                    }
                }
                Ok(Event::Resize(cols, rows)) => {
                    let _ = pty.resize(rows, cols);
                }
                Ok(_) => {}
                Err(e) => break Err(e.into()),
            },
            Err(e) => break Err(e.into()),
        }
    };

    pump.abort();
    disable_raw_mode()?;
    println!();
    result
}

/// Translate a key event into the bytes a terminal would produce
fn encode_key(
    code: crossterm::event::KeyCode,
    modifiers: crossterm::event::KeyModifiers,
) -> Option<Vec<u8>> {
    use crossterm::event::{KeyCode, KeyModifiers};

    let bytes = match code {
        KeyCode::Char(c) => {
            if modifiers.contains(KeyModifiers::CONTROL) {
                let c = c.to_ascii_lowercase();
                if c.is_ascii_lowercase() {
                    vec![c as u8 - b'a' + 1]
                } else {
                    return None;
                }
            } else {
                c.to_string().into_bytes()
            }
        }
        KeyCode::Enter => vec![b'\r'],
        KeyCode::Backspace => vec![0x7F],
        KeyCode::Tab => vec![b'\t'],
        KeyCode::Esc => vec![0x1B],
        KeyCode::Up => b"\x1b[A".to_vec(),
        KeyCode::Down => b"\x1b[B".to_vec(),
        KeyCode::Right => b"\x1b[C".to_vec(),
        KeyCode::Left => b"\x1b[D".to_vec(),
        KeyCode::Home => b"\x1b[H".to_vec(),
        KeyCode::End => b"\x1b[F".to_vec(),
        KeyCode::Delete => b"\x1b[3~".to_vec(),
        KeyCode::PageUp => b"\x1b[5~".to_vec(),
        KeyCode::PageDown => b"\x1b[6~".to_vec(),
        _ => return None,
    };
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyModifiers};

    #[test]
    fn test_attach_fallback_only_for_default_port() {
        let err = MeshError::PortUnavailable(50051);
        let seed = attach_fallback("127.0.0.1", 50051, &err).unwrap();
        assert_eq!(seed.endpoint(), "127.0.0.1:50051");

        // A non-default port surfaces as a fatal error
        let err = MeshError::PortUnavailable(9000);
        assert!(attach_fallback("127.0.0.1", 9000, &err).is_none());

        // Unrelated errors never trigger the fallback
        let err = MeshError::ConnectionTimeout;
        assert!(attach_fallback("127.0.0.1", 50051, &err).is_none());
    }

    #[test]
    fn test_encode_key_plain_and_control() {
        assert_eq!(
            encode_key(KeyCode::Char('a'), KeyModifiers::NONE),
            Some(b"a".to_vec())
        );
        assert_eq!(
            encode_key(KeyCode::Char('c'), KeyModifiers::CONTROL),
            Some(vec![0x03])
        );
        assert_eq!(
            encode_key(KeyCode::Enter, KeyModifiers::NONE),
            Some(vec![b'\r'])
        );
        assert_eq!(
            encode_key(KeyCode::Up, KeyModifiers::NONE),
            Some(b"\x1b[A".to_vec())
        );
        assert_eq!(encode_key(KeyCode::CapsLock, KeyModifiers::NONE), None);
    }
}
