//! Kill command: stop join sessions
//!
//! The peer form dials each target and asks its system actor to shut
//! down. `--all` stays local: it signals every `mm join` process owned
//! by the invoking user.

use anyhow::{bail, Result};
use sysinfo::{Signal, System};

use mm_protocol::PeerId;

use super::ephemeral_system;
use crate::output::{print_error, print_info, print_success};

/// Stop join sessions by peer id, or all local ones with `--all`
pub async fn kill_command(peers: Vec<String>, all: bool, force: bool) -> Result<()> {
    if all {
        return kill_all(force);
    }
    if peers.is_empty() {
        bail!("Nothing to kill: give peer ids or --all");
    }

    let system = ephemeral_system().await?;
    let mut failures = 0usize;
    for spec in &peers {
        let outcome = async {
            let peer: PeerId = spec.parse()?;
            let effective = system.connect_to_peer(&peer).await?;
            system.system_ref(effective).shutdown().await?;
            Ok::<_, anyhow::Error>(())
        }
        .await;
        match outcome {
            Ok(()) => print_success(&format!("Stopped {spec}")),
            Err(e) => {
                print_error(&format!("Could not stop {spec}: {e:#}"));
                failures += 1;
            }
        }
    }
    system.stop().await;

    if failures > 0 {
        bail!("{failures} of {} peer(s) could not be stopped", peers.len());
    }
    Ok(())
}

/// Signal every `mm join` process owned by the current user
fn kill_all(force: bool) -> Result<()> {
    let sys = System::new_all();
    let me = sysinfo::get_current_pid().ok();
    let my_uid = me
        .and_then(|pid| sys.process(pid))
        .and_then(|p| p.user_id().cloned());

    let signal = if force { Signal::Kill } else { Signal::Term };
    let mut count = 0usize;
    for (pid, process) in sys.processes() {
        if Some(*pid) == me {
            continue;
        }
        let is_join = process.name().to_string_lossy() == "mm"
            && process.cmd().iter().any(|arg| arg.to_string_lossy() == "join");
        let owned = match (&my_uid, process.user_id()) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => false,
        };
        if is_join && owned && process.kill_with(signal).unwrap_or(false) {
            print_info(&format!("Sent {signal:?} to PID {pid}"));
            count += 1;
        }
    }

    if count == 0 {
        print_info("No join sessions found");
    } else {
        print_success(&format!("Signalled {count} join session(s)"));
    }
    Ok(())
}
