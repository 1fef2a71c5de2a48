//! Console session: one engine process driven through its menu.
//!
//! A session walks `Starting → AwaitingReady → Sending → Draining → Closed`.
//! The session deadline covers every phase. When it fires, the engine is
//! asked to stop, force-killed after a grace period, and whatever output was
//! captured is returned with `timed_out = true`.
//!
//! stdout and stderr are each read by their own task into an unbounded
//! channel for the whole lifetime of the process, so the engine can never
//! stall on a full output pipe while the session is blocked on a write or
//! a wait.
//!
//! # Synchronization
//!
//! - [`SyncStrategy::Event`] scans newly-arrived stdout for each step's
//!   trigger (the menu banner or a follow-up prompt) and writes only once
//!   it appears. Each trigger consumes one occurrence, so a second menu
//!   banner is required before the exit digit is sent.
//! - [`SyncStrategy::FixedDelay`] sleeps a startup quantum and then each
//!   step's `min_delay`. It exists for engines whose prompts cannot be
//!   matched reliably.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;

use crate::config::{EngineConfig, SessionConfig, SyncStrategy};
use crate::error::{BridgeError, Result};
use crate::models::{CommandScript, Operation, SessionPhase, SessionResult, Trigger};

const READ_CHUNK: usize = 8192;

/// How to launch the engine.
#[derive(Debug, Clone)]
pub struct EngineCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl EngineCommand {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            program: cfg.path.clone(),
            args: cfg.args.clone(),
            working_dir: cfg.resolved_working_dir(),
        }
    }
}

/// Timing and synchronization rules for one run.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub sync: SyncStrategy,
    pub ready_marker: String,
    /// Wall-clock budget for the whole run.
    pub timeout: Duration,
    /// Time allowed between the stop request and the force kill.
    pub kill_grace: Duration,
    /// Fixed-delay only: pause before the first write.
    pub startup_delay: Duration,
}

impl SessionPolicy {
    pub fn for_operation(cfg: &SessionConfig, op: &Operation) -> Self {
        Self {
            sync: cfg.sync,
            ready_marker: cfg.ready_marker.clone(),
            timeout: cfg.timeout_for(op),
            kill_grace: Duration::from_millis(cfg.kill_grace_ms),
            startup_delay: Duration::from_millis(cfg.startup_delay_ms),
        }
    }
}

/// Something that can execute a command script against an engine.
#[async_trait]
pub trait SessionRunner: Send + Sync {
    async fn run(&self, script: &CommandScript, policy: &SessionPolicy) -> Result<SessionResult>;
}

/// Runs scripts against a real engine process.
#[derive(Debug, Clone)]
pub struct ConsoleSession {
    engine: EngineCommand,
}

impl ConsoleSession {
    pub fn new(engine: EngineCommand) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl SessionRunner for ConsoleSession {
    async fn run(&self, script: &CommandScript, policy: &SessionPolicy) -> Result<SessionResult> {
        run(&self.engine, script, policy).await
    }
}

/// Spawn the engine, feed it `script`, and capture everything it prints.
///
/// Only spawn failures are errors. A hang or a slow engine yields a result
/// with `timed_out = true` and the partial output.
pub async fn run(
    engine: &EngineCommand,
    script: &CommandScript,
    policy: &SessionPolicy,
) -> Result<SessionResult> {
    let started = Instant::now();
    let deadline = tokio::time::Instant::now() + policy.timeout;

    let mut child = spawn(engine)?;
    let pid = child.id();
    tracing::debug!(?pid, program = %engine.program.display(), "engine started");

    let (stdin, stdout, stderr) = match (child.stdin.take(), child.stdout.take(), child.stderr.take()) {
        (Some(i), Some(o), Some(e)) => (i, o, e),
        _ => {
            return Err(BridgeError::EngineUnavailable {
                path: engine.program.clone(),
                reason: "failed to capture engine stdio".into(),
            })
        }
    };

    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (err_tx, err_rx) = mpsc::unbounded_channel();
    let stdout_task = tokio::spawn(pump(stdout, out_tx));
    let stderr_task = tokio::spawn(pump(stderr, err_tx));

    let mut convo = Conversation::new(out_rx);
    let mut stderr_buf = StreamBuffer::new(err_rx);

    let driven = tokio::time::timeout_at(deadline, convo.drive(stdin, &mut child, script, policy)).await;

    let (exit_code, timed_out_in) = match driven {
        Ok(Ok(status)) => (status.code(), None),
        Ok(Err(e)) => {
            tracing::error!(?pid, error = %e, "failed waiting for engine exit");
            (None, None)
        }
        Err(_) => {
            let phase = convo.phase;
            tracing::warn!(
                ?pid,
                ?phase,
                timeout_ms = policy.timeout.as_millis() as u64,
                "engine session timed out, terminating"
            );
            (terminate(&mut child, policy.kill_grace).await, Some(phase))
        }
    };

    // The pipes close once the process is gone, unless something it spawned
    // still holds them; bound the tail either way.
    let _ = tokio::time::timeout(policy.kill_grace, convo.stdout.drain()).await;
    let _ = tokio::time::timeout(policy.kill_grace, stderr_buf.drain()).await;
    convo.stdout.take_ready();
    stderr_buf.take_ready();
    stdout_task.abort();
    stderr_task.abort();

    let result = SessionResult {
        raw_output: String::from_utf8_lossy(&convo.stdout.bytes).into_owned(),
        stderr: String::from_utf8_lossy(&stderr_buf.bytes).into_owned(),
        exit_code,
        timed_out: timed_out_in.is_some(),
        timed_out_in,
        elapsed: started.elapsed(),
    };

    tracing::debug!(
        ?pid,
        exit_code = ?result.exit_code,
        timed_out = result.timed_out,
        stdout_bytes = result.raw_output.len(),
        stderr_bytes = result.stderr.len(),
        "engine session closed"
    );

    Ok(result)
}

fn spawn(engine: &EngineCommand) -> Result<Child> {
    let unavailable = |reason: String| BridgeError::EngineUnavailable {
        path: engine.program.clone(),
        reason,
    };

    // Bare names are resolved through PATH; anything with a directory must exist
    if engine.program.components().count() > 1 && !engine.program.exists() {
        return Err(unavailable(
            "engine binary not found, compile search_engine first".into(),
        ));
    }

    let mut cmd = Command::new(&engine.program);
    cmd.args(&engine.args)
        .current_dir(&engine.working_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    cmd.spawn().map_err(|e| unavailable(e.to_string()))
}

/// Copy a pipe into a channel until EOF or until the receiver goes away.
async fn pump<R: AsyncRead + Unpin>(mut reader: R, tx: mpsc::UnboundedSender<Vec<u8>>) {
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                tracing::trace!(bytes = n, "engine output");
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "engine pipe read failed");
                break;
            }
        }
    }
}

/// Accumulates one output stream.
struct StreamBuffer {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    bytes: Vec<u8>,
}

impl StreamBuffer {
    fn new(rx: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        Self {
            rx,
            bytes: Vec::new(),
        }
    }

    /// Wait for the next chunk. `false` once the stream has ended.
    async fn next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(chunk) => {
                self.bytes.extend_from_slice(&chunk);
                true
            }
            None => false,
        }
    }

    /// Read until the stream ends.
    async fn drain(&mut self) {
        while self.next().await {}
    }

    /// Take whatever is already queued without waiting.
    fn take_ready(&mut self) {
        while let Ok(chunk) = self.rx.try_recv() {
            self.bytes.extend_from_slice(&chunk);
        }
    }
}

/// The write side of a session plus the stdout it is synchronizing on.
struct Conversation {
    stdout: StreamBuffer,
    /// Bytes of stdout already consumed by earlier triggers.
    cursor: usize,
    phase: SessionPhase,
}

impl Conversation {
    fn new(rx: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        Self {
            stdout: StreamBuffer::new(rx),
            cursor: 0,
            phase: SessionPhase::Starting,
        }
    }

    async fn drive(
        &mut self,
        mut stdin: ChildStdin,
        child: &mut Child,
        script: &CommandScript,
        policy: &SessionPolicy,
    ) -> std::io::Result<ExitStatus> {
        self.phase = SessionPhase::AwaitingReady;
        if policy.sync == SyncStrategy::FixedDelay {
            tokio::time::sleep(policy.startup_delay).await;
        }

        for step in script.steps() {
            self.phase = SessionPhase::AwaitingReady;
            match policy.sync {
                SyncStrategy::Event => {
                    if let Some(trigger) = step.trigger {
                        let marker = match trigger {
                            Trigger::Ready => policy.ready_marker.as_str(),
                            Trigger::Prompt(prompt) => prompt,
                        };
                        if !self.wait_for(marker).await {
                            tracing::warn!(marker, "engine output ended before prompt, not sending more input");
                            break;
                        }
                    }
                }
                SyncStrategy::FixedDelay => tokio::time::sleep(step.min_delay).await,
            }

            self.phase = SessionPhase::Sending;
            if let Err(e) = write_line(&mut stdin, &step.line).await {
                tracing::warn!(error = %e, line = %step.line, "engine stopped accepting input");
                break;
            }
            tracing::debug!(line = %step.line, "sent to engine");
        }

        // Closing stdin tells the engine no more commands are coming
        drop(stdin);

        self.phase = SessionPhase::Draining;
        self.stdout.drain().await;
        let status = child.wait().await?;
        self.phase = SessionPhase::Closed;
        Ok(status)
    }

    /// Wait until `marker` appears in stdout past the cursor, then move the
    /// cursor beyond it. `false` if stdout ends first.
    async fn wait_for(&mut self, marker: &str) -> bool {
        let needle = marker.as_bytes();
        loop {
            if let Some(at) = find(&self.stdout.bytes[self.cursor..], needle) {
                self.cursor += at + needle.len();
                return true;
            }
            if !self.stdout.next().await {
                return false;
            }
        }
    }
}

async fn write_line(stdin: &mut ChildStdin, line: &str) -> std::io::Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await
}

/// Ask the engine to stop, then kill it if it is still alive after `grace`.
async fn terminate(child: &mut Child, grace: Duration) -> Option<i32> {
    request_stop(child);
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => status.code(),
        _ => {
            if let Err(e) = child.kill().await {
                tracing::warn!(error = %e, "failed to kill engine");
            }
            child.try_wait().ok().flatten().and_then(|s| s.code())
        }
    }
}

#[cfg(unix)]
fn request_stop(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            tracing::debug!(pid, error = %e, "SIGTERM failed");
        }
    }
}

#[cfg(not(unix))]
fn request_stop(child: &mut Child) {
    // No graceful signal to send; the grace period is skipped by killing now
    let _ = child.start_kill();
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
