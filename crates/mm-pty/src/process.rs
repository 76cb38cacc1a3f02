//! PTY process management
//!
//! Built on the portable-pty crate. The master writer sits behind a
//! mutex so any thread may type into the terminal; a dedicated reader
//! thread pumps master output into a channel for the interactive session
//! to drain.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use tokio::sync::mpsc;

use mm_core::{MeshError, Pty};

/// Buffered output chunks between the reader thread and the consumer
const OUTPUT_CHANNEL_CAPACITY: usize = 64;

/// Polling window granted at each step of the close escalation
const ESCALATION_GRACE: Duration = Duration::from_secs(1);

/// A child process attached to a pseudo-terminal
pub struct PtyProcess {
    command_line: String,
    child_pid: Option<u32>,
    writer: Mutex<Box<dyn Write + Send>>,
    child: Mutex<Box<dyn Child + Send + Sync>>,
    master: Mutex<Box<dyn MasterPty + Send>>,
    output_rx: Mutex<Option<mpsc::Receiver<Vec<u8>>>>,
    closed: AtomicBool,
}

impl PtyProcess {
    /// Spawn `program` with `args` inside a fresh 24x80 PTY.
    ///
    /// `env` entries are applied on top of a sane TERM default.
    pub fn spawn(
        program: &str,
        args: &[String],
        env: &[(String, String)],
    ) -> Result<Self, MeshError> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: 24,
                cols: 80,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(to_io_error)?;

        let mut cmd = CommandBuilder::new(program);
        cmd.args(args);
        cmd.env("TERM", "xterm-256color");
        for (key, value) in env {
            cmd.env(key, value);
        }

        let child = pair.slave.spawn_command(cmd).map_err(to_io_error)?;
        // The slave side belongs to the child now
        drop(pair.slave);

        let child_pid = child.process_id();
        tracing::debug!("Spawned {program} with PID {child_pid:?}");

        let reader = pair.master.try_clone_reader().map_err(to_io_error)?;
        let writer = pair.master.take_writer().map_err(to_io_error)?;

        let (output_tx, output_rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        std::thread::spawn(move || pump_output(reader, output_tx));

        let command_line = if args.is_empty() {
            program.to_string()
        } else {
            format!("{program} {}", args.join(" "))
        };

        Ok(Self {
            command_line,
            child_pid,
            writer: Mutex::new(writer),
            child: Mutex::new(child),
            master: Mutex::new(pair.master),
            output_rx: Mutex::new(Some(output_rx)),
            closed: AtomicBool::new(false),
        })
    }

    /// Take the single-consumer stream of terminal output chunks.
    /// Returns `None` after the first call.
    pub fn take_output(&self) -> Option<mpsc::Receiver<Vec<u8>>> {
        self.output_rx.lock().unwrap().take()
    }

    /// Process id of the spawned child
    pub fn pid(&self) -> Option<u32> {
        self.child_pid
    }

    /// Resize the terminal
    pub fn resize(&self, rows: u16, cols: u16) -> Result<(), MeshError> {
        self.master
            .lock()
            .unwrap()
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(to_io_error)?;
        Ok(())
    }

    fn write_all(&self, bytes: &[u8]) -> Result<(), MeshError> {
        let mut writer = self.writer.lock().unwrap();
        writer
            .write_all(bytes)
            .and_then(|_| writer.flush())
            .map_err(|_| MeshError::PtyClosed)
    }

    /// Poll for child exit until the grace period runs out
    fn wait_for_exit(&self, grace: Duration) -> bool {
        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if !self.is_running() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        !self.is_running()
    }

    #[cfg(unix)]
    fn signal_process_group(&self, signal: nix::sys::signal::Signal) {
        if let Some(pid) = self.child_pid {
            let pgid = nix::unistd::Pid::from_raw(pid as i32);
            if let Err(e) = nix::sys::signal::killpg(pgid, signal) {
                tracing::debug!("killpg({pgid}, {signal}) failed: {e}");
            }
        }
    }
}

impl Pty for PtyProcess {
    fn write_line(&self, text: &str) -> Result<(), MeshError> {
        self.write_raw(text.as_bytes())?;
        self.write_raw(b"\r")
    }

    fn write_raw(&self, bytes: &[u8]) -> Result<(), MeshError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(MeshError::PtyClosed);
        }
        self.write_all(bytes)
    }

    fn is_running(&self) -> bool {
        let mut child = self.child.lock().unwrap();
        matches!(child.try_wait(), Ok(None))
    }

    /// Escalate until the child is gone: Ctrl-C through the terminal,
    /// then SIGINT, SIGTERM, SIGKILL to the process group, with a grace
    /// period of polling between steps
    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if !self.is_running() {
            return;
        }

        tracing::debug!("Closing PTY for {}", self.command_line);
        let _ = self.write_all(&[0x03]);
        if self.wait_for_exit(ESCALATION_GRACE) {
            return;
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::Signal;
            for signal in [Signal::SIGINT, Signal::SIGTERM, Signal::SIGKILL] {
                self.signal_process_group(signal);
                if self.wait_for_exit(ESCALATION_GRACE) {
                    return;
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = self.child.lock().unwrap().kill();
            self.wait_for_exit(ESCALATION_GRACE);
        }
    }

    fn command(&self) -> Option<String> {
        Some(self.command_line.clone())
    }

    fn cwd(&self) -> Option<String> {
        #[cfg(target_os = "linux")]
        {
            let pid = self.child_pid?;
            std::fs::read_link(format!("/proc/{pid}/cwd"))
                .ok()
                .map(|p| p.display().to_string())
        }
        #[cfg(not(target_os = "linux"))]
        {
            None
        }
    }

    fn foreground_process(&self) -> Option<String> {
        #[cfg(target_os = "linux")]
        {
            let pgid = self.master.lock().unwrap().process_group_leader()?;
            std::fs::read_to_string(format!("/proc/{pgid}/comm"))
                .ok()
                .map(|s| s.trim().to_string())
        }
        #[cfg(not(target_os = "linux"))]
        {
            None
        }
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) && self.is_running() {
            // Last resort; orderly teardown goes through close()
            let _ = self.child.lock().unwrap().kill();
        }
    }
}

fn to_io_error(e: anyhow::Error) -> MeshError {
    MeshError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
}

fn pump_output(mut reader: Box<dyn Read + Send>, tx: mpsc::Sender<Vec<u8>>) {
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.blocking_send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn read_until(
        rx: &mut mpsc::Receiver<Vec<u8>>,
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
    async fn test_spawn_cat_echoes_lines() {
        let pty = PtyProcess::spawn("cat", &[], &[]).unwrap();
        let mut rx = pty.take_output().unwrap();

        pty.write_line("hello").unwrap();
        let output = read_until(&mut rx, "hello", Duration::from_secs(5)).await;
        assert!(output.contains("hello"), "output was: {output:?}");

        pty.close();
    }

    #[tokio::test]
    async fn test_is_running_and_close() {
        let pty = PtyProcess::spawn("cat", &[], &[]).unwrap();
        assert!(pty.is_running());

        pty.close();
        assert!(!pty.is_running());
        assert!(matches!(pty.write_raw(b"x"), Err(MeshError::PtyClosed)));
    }

    #[tokio::test]
    async fn test_take_output_single_consumer() {
        let pty = PtyProcess::spawn("cat", &[], &[]).unwrap();
        assert!(pty.take_output().is_some());
        assert!(pty.take_output().is_none());
        pty.close();
    }

    #[test]
    fn test_command_reflects_spawn_line() {
        let pty = PtyProcess::spawn("sleep", &["30".to_string()], &[]).unwrap();
        assert_eq!(pty.command().as_deref(), Some("sleep 30"));
        pty.close();
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_cwd_points_at_proc() {
        let pty = PtyProcess::spawn("sleep", &["30".to_string()], &[]).unwrap();
        let cwd = pty.cwd();
        assert!(cwd.is_some());
        pty.close();
    }
}
