//! Server process supervision
//!
//! Spawns the MCP server with piped stdio, drains its stderr in the
//! background, and handles liveness checks and bounded shutdown.

use crate::config::ServerConfig;
use crate::error::McpError;
use parking_lot::Mutex;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Most recent stderr bytes kept per session
const STDERR_CAPACITY: usize = 64 * 1024;

/// How long a failure report waits for stderr to reach EOF after exit
const STDERR_SETTLE: Duration = Duration::from_millis(200);

/// Liveness of the supervised process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Still running
    Running,
    /// Exited; the code is `None` when ended by a signal
    Exited(Option<i32>),
}

/// How the process ended
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitReport {
    /// Exit code, if the process exited normally
    pub exit_code: Option<i32>,
    /// Whether the process had to be killed
    pub forced: bool,
    /// Everything captured from stderr (tail-bounded)
    pub stderr: String,
}

/// Bounded buffer holding the tail of the server's stderr
#[derive(Debug, Default)]
struct StderrTail {
    bytes: Vec<u8>,
    truncated: bool,
}

impl StderrTail {
    fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
        if self.bytes.len() > STDERR_CAPACITY {
            let excess = self.bytes.len() - STDERR_CAPACITY;
            self.bytes.drain(..excess);
            self.truncated = true;
        }
    }

    fn snapshot(&self) -> String {
        let text = String::from_utf8_lossy(&self.bytes);
        if self.truncated {
            format!("[earlier output truncated]\n{}", text)
        } else {
            text.into_owned()
        }
    }
}

/// Owns the server child process and its stdin
pub struct ProcessSupervisor {
    command: String,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Arc<Mutex<StderrTail>>,
    stderr_task: Option<JoinHandle<()>>,
    exit_code: Option<Option<i32>>,
}

impl ProcessSupervisor {
    /// Spawn the server described by `config`
    ///
    /// Panics outside a Tokio runtime.
    pub fn spawn(config: &ServerConfig) -> Result<Self, McpError> {
        let mut cmd = Command::new(&config.command);

        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in &config.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &config.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| McpError::spawn(&config.command, e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::spawn(&config.command, "failed to get stdin handle"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::spawn(&config.command, "failed to get stdout handle"))?;
        let stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| McpError::spawn(&config.command, "failed to get stderr handle"))?;

        let stderr = Arc::new(Mutex::new(StderrTail::default()));
        let stderr_task = tokio::spawn(drain_stderr(stderr_pipe, Arc::clone(&stderr)));

        debug!(command = %config.command, pid = ?child.id(), "spawned MCP server");

        Ok(Self {
            command: config.command.clone(),
            child: Some(child),
            stdin: Some(stdin),
            stdout: Some(stdout),
            stderr,
            stderr_task: Some(stderr_task),
            exit_code: None,
        })
    }

    /// Hand the output stream to its reader; only the first call gets it
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    /// OS process id while the child is running
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Write one already-framed line to the server's stdin
    pub async fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdin already closed")
        })?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await
    }

    /// Non-blocking liveness check
    pub fn liveness(&mut self) -> Liveness {
        if let Some(code) = self.exit_code {
            return Liveness::Exited(code);
        }
        let Some(child) = self.child.as_mut() else {
            return Liveness::Exited(None);
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                self.exit_code = Some(status.code());
                Liveness::Exited(status.code())
            }
            Ok(None) => Liveness::Running,
            Err(e) => {
                warn!(command = %self.command, "failed to poll MCP server status: {}", e);
                Liveness::Running
            }
        }
    }

    /// Whether the child is still running
    pub fn is_alive(&mut self) -> bool {
        self.liveness() == Liveness::Running
    }

    /// Captured stderr so far.
    ///
    /// Once the child has exited, waits briefly for the drain task to see
    /// EOF so late output is included.
    pub async fn stderr_output(&mut self) -> String {
        if !self.is_alive() {
            self.settle_stderr(STDERR_SETTLE).await;
        }
        self.stderr.lock().snapshot()
    }

    /// Close stdin, wait up to `grace` for exit, then kill
    pub async fn terminate(&mut self, grace: Duration) -> Result<ExitReport, McpError> {
        // EOF on stdin asks a well-behaved server to exit
        self.stdin.take();

        let mut forced = false;
        if let Some(mut child) = self.child.take() {
            let status = match timeout(grace, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    warn!(command = %self.command, ?grace, "MCP server did not exit, killing it");
                    forced = true;
                    child.kill().await?;
                    child.wait().await?
                }
            };
            self.exit_code = Some(status.code());
        }

        self.settle_stderr(STDERR_SETTLE).await;

        Ok(ExitReport {
            exit_code: self.exit_code.flatten(),
            forced,
            stderr: self.stderr.lock().snapshot(),
        })
    }

    async fn settle_stderr(&mut self, limit: Duration) {
        if let Some(task) = self.stderr_task.as_mut() {
            if timeout(limit, task).await.is_ok() {
                self.stderr_task = None;
            }
        }
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }
}

async fn drain_stderr(mut pipe: ChildStderr, sink: Arc<Mutex<StderrTail>>) {
    let mut buf = [0u8; 4096];
    loop {
        match pipe.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => sink.lock().push(&buf[..n]),
        }
    }
}
