//! In-memory transport that replays a fixed script of server output

use super::{ExitReport, LineRead, Liveness, McpTransport};
use crate::error::McpError;
use crate::protocol::McpMessage;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};

/// One scripted event on the server side
#[derive(Debug, Clone)]
pub(crate) enum Step {
    /// The server prints this line
    Line(String),
    /// Nothing arrives for one read attempt
    Idle,
    /// The server exits with this code; its stdout reaches EOF afterwards
    Exit(i32),
    /// The server closes its stdout but keeps running
    CloseOutput,
    /// The read fails because the server died with this code
    Broken(i32),
}

impl Step {
    pub(crate) fn json(value: Value) -> Self {
        Self::Line(value.to_string())
    }

    pub(crate) fn result(id: i64, result: Value) -> Self {
        Self::json(json!({"jsonrpc": "2.0", "id": id, "result": result}))
    }

    pub(crate) fn notification(method: &str) -> Self {
        Self::json(json!({"jsonrpc": "2.0", "method": method, "params": {}}))
    }
}

/// What happens once the script runs out
#[derive(Debug, Clone, Copy)]
pub(crate) enum Tail {
    /// Stay silent until each read's deadline
    Silent,
    /// Emit a progress notification every few milliseconds, forever
    Chatter,
}

/// Messages the client wrote, shared with the test
pub(crate) type SentLog = Arc<Mutex<Vec<McpMessage>>>;

pub(crate) struct ScriptedTransport {
    steps: VecDeque<Step>,
    tail: Tail,
    exit_code: Option<i32>,
    output_closed: bool,
    stderr: String,
    sent: SentLog,
    connected: bool,
}

impl ScriptedTransport {
    pub(crate) fn new(steps: impl IntoIterator<Item = Step>) -> (Self, SentLog) {
        let sent = SentLog::default();
        let transport = Self {
            steps: steps.into_iter().collect(),
            tail: Tail::Silent,
            exit_code: None,
            output_closed: false,
            stderr: String::new(),
            sent: Arc::clone(&sent),
            connected: true,
        };
        (transport, sent)
    }

    pub(crate) fn with_tail(mut self, tail: Tail) -> Self {
        self.tail = tail;
        self
    }

    pub(crate) fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }
}

#[async_trait]
impl McpTransport for ScriptedTransport {
    async fn send(&mut self, message: &McpMessage) -> Result<(), McpError> {
        if !self.connected {
            return Err(McpError::NotConnected);
        }
        if self.exit_code.is_some() {
            return Err(McpError::transport("Broken pipe (os error 32)"));
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }

    async fn read_line(&mut self, deadline: Instant) -> Result<LineRead, McpError> {
        match self.steps.pop_front() {
            Some(Step::Line(line)) => Ok(LineRead::Line(line)),
            Some(Step::Idle) => {
                sleep_until(deadline).await;
                Ok(LineRead::Idle)
            }
            Some(Step::Exit(code)) => {
                self.exit_code = Some(code);
                Ok(LineRead::Idle)
            }
            Some(Step::CloseOutput) => {
                self.output_closed = true;
                Ok(LineRead::Closed)
            }
            Some(Step::Broken(code)) => {
                self.exit_code = Some(code);
                Err(McpError::transport("Connection reset by peer (os error 104)"))
            }
            None if self.exit_code.is_some() || self.output_closed => Ok(LineRead::Closed),
            None => match self.tail {
                Tail::Silent => {
                    sleep_until(deadline).await;
                    Ok(LineRead::Idle)
                }
                Tail::Chatter => {
                    sleep_until(deadline.min(Instant::now() + Duration::from_millis(2))).await;
                    Ok(LineRead::Line(
                        json!({"jsonrpc": "2.0", "method": "notifications/progress"}).to_string(),
                    ))
                }
            },
        }
    }

    fn liveness(&mut self) -> Liveness {
        match self.exit_code {
            Some(code) => Liveness::Exited(Some(code)),
            None => Liveness::Running,
        }
    }

    async fn stderr_output(&mut self) -> String {
        self.stderr.clone()
    }

    async fn close(&mut self, _grace: Duration) -> Result<ExitReport, McpError> {
        self.connected = false;
        Ok(ExitReport {
            exit_code: Some(self.exit_code.unwrap_or(0)),
            forced: false,
            stderr: self.stderr.clone(),
        })
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
