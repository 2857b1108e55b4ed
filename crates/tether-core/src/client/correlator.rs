//! Request/response correlation
//!
//! Ids are allocated here, and every line read while a request is outstanding
//! is routed here. Matching is strictly by id: the server may interleave
//! notifications, log noise and stray replies with the response we want.

use super::notification::SyncNotificationHandler;
use crate::codec;
use crate::error::McpError;
use crate::protocol::{McpMessage, McpResponse, RequestId};
use crate::transport::{LineRead, Liveness, McpTransport};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Shortest time given to a server to be reaped after its pipes fail
const EXIT_SETTLE: Duration = Duration::from_millis(500);

/// Lifecycle of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Written to the server, no outcome yet
    Sent,
    /// The matching response arrived
    Resolved,
    /// The deadline passed first
    TimedOut,
    /// The server died or closed its output first
    Aborted,
}

impl RequestState {
    /// Whether the request's lifecycle is over
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Sent)
    }
}

/// Entry in the pending request table
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// Method name, kept for diagnostics
    pub method: String,
    /// Where the request is in its lifecycle
    pub state: RequestState,
    /// When the request was registered
    pub sent_at: Instant,
}

/// Where an inbound message went
#[derive(Debug, PartialEq)]
pub(crate) enum Routing {
    /// The response for the awaited id
    Matched(McpResponse),
    /// A response for another pending id, held for its own wait
    Parked,
    /// Anything that cannot affect the awaited request
    Ignored,
}

/// Matches responses to outstanding requests by id
#[derive(Debug)]
pub struct Correlator {
    next_id: i64,
    pending: HashMap<RequestId, PendingRequest>,
    parked: HashMap<RequestId, McpResponse>,
    poll_interval: Duration,
}

impl Correlator {
    /// Create a correlator whose first id is 1
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            next_id: 1,
            pending: HashMap::new(),
            parked: HashMap::new(),
            poll_interval,
        }
    }

    /// Allocate the next id and record it as pending
    pub fn register(&mut self, method: impl Into<String>) -> RequestId {
        let id = RequestId::Number(self.next_id);
        self.next_id += 1;
        self.pending.insert(
            id.clone(),
            PendingRequest {
                method: method.into(),
                state: RequestState::Sent,
                sent_at: Instant::now(),
            },
        );
        id
    }

    /// Whether `id` is waiting for a response
    pub fn is_pending(&self, id: &RequestId) -> bool {
        self.pending.contains_key(id)
    }

    /// Number of outstanding requests
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop a request without waiting for it
    pub fn abandon(&mut self, id: &RequestId, state: RequestState) {
        self.finish(id, state);
    }

    /// Wait for the response to `id` until `deadline`.
    ///
    /// Returns the response's `result`, or the matching failure. Whatever the
    /// outcome, `id` is no longer pending afterwards.
    pub async fn await_response(
        &mut self,
        transport: &mut dyn McpTransport,
        id: &RequestId,
        deadline: Instant,
        notifications: &dyn SyncNotificationHandler,
    ) -> Result<Value, McpError> {
        let Some(method) = self.pending.get(id).map(|p| p.method.clone()) else {
            return Err(McpError::protocol(format!("request {} is not pending", id)));
        };

        if let Some(response) = self.parked.remove(id) {
            return self.resolve(id, &method, response);
        }

        let mut exited: Option<Option<i32>> = None;

        loop {
            let now = Instant::now();

            if exited.is_none() {
                if now >= deadline {
                    return Err(self.timed_out(transport, id, &method));
                }
                if let Liveness::Exited(code) = transport.liveness() {
                    debug!(%id, ?code, "MCP server exited, draining its remaining output");
                    exited = Some(code);
                }
            }

            // Once the server is gone its buffered output is drained without
            // waiting; only a line that is already there counts.
            let read_until = match exited {
                Some(_) => now,
                None => deadline.min(now + self.poll_interval),
            };

            match transport.read_line(read_until).await {
                Ok(LineRead::Line(line)) => match codec::decode(&line) {
                    Ok(message) => {
                        if let Routing::Matched(response) =
                            self.route(message, id, notifications)
                        {
                            return self.resolve(id, &method, response);
                        }
                    }
                    Err(e) => {
                        debug!("Skipping non-protocol output line ({}): {}", e, line);
                    }
                },
                Ok(LineRead::Idle) => {
                    if let Some(code) = exited {
                        return Err(self.aborted(transport, id, &method, code).await);
                    }
                }
                Ok(LineRead::Closed) => {
                    return Err(match self.exit_after_failure(transport, exited).await {
                        Some(code) => self.aborted(transport, id, &method, code).await,
                        None => {
                            self.finish(id, RequestState::Aborted);
                            McpError::StreamClosed {
                                id: id.clone(),
                                method,
                                stderr: transport.stderr_output().await,
                            }
                        }
                    });
                }
                Err(e) => {
                    warn!(%id, "Reading from MCP server failed: {}", e);
                    return Err(match self.exit_after_failure(transport, exited).await {
                        Some(code) => self.aborted(transport, id, &method, code).await,
                        None => {
                            self.finish(id, RequestState::Aborted);
                            e
                        }
                    });
                }
            }
        }
    }

    /// Route one decoded message while `awaited` is outstanding
    pub(crate) fn route(
        &mut self,
        message: McpMessage,
        awaited: &RequestId,
        notifications: &dyn SyncNotificationHandler,
    ) -> Routing {
        match message {
            McpMessage::Notification(notification) => {
                notifications.handle(&notification.method, notification.params.as_ref());
                Routing::Ignored
            }
            McpMessage::Request(request) => {
                warn!(
                    "Ignoring server request {} (id {}) while waiting for {}",
                    request.method, request.id, awaited
                );
                Routing::Ignored
            }
            McpMessage::Response(response) if &response.id == awaited => {
                Routing::Matched(response)
            }
            McpMessage::Response(response) if self.pending.contains_key(&response.id) => {
                trace!("Parking response {} while waiting for {}", response.id, awaited);
                // first delivery wins
                self.parked.entry(response.id.clone()).or_insert(response);
                Routing::Parked
            }
            McpMessage::Response(response) => {
                warn!(
                    "Discarding response with id {} (expected {}): no such pending request",
                    response.id, awaited
                );
                Routing::Ignored
            }
        }
    }

    /// Exit code of a server whose output just failed, if it is gone
    async fn exit_after_failure(
        &self,
        transport: &mut dyn McpTransport,
        exited: Option<Option<i32>>,
    ) -> Option<Option<i32>> {
        match exited {
            Some(code) => Some(code),
            None => wait_for_exit(transport, self.poll_interval).await,
        }
    }

    fn resolve(
        &mut self,
        id: &RequestId,
        method: &str,
        response: McpResponse,
    ) -> Result<Value, McpError> {
        self.finish(id, RequestState::Resolved);
        response
            .into_result()
            .map_err(|payload| McpError::server(id.clone(), method, payload))
    }

    fn timed_out(
        &mut self,
        transport: &dyn McpTransport,
        id: &RequestId,
        method: &str,
    ) -> McpError {
        let elapsed = self.finish(id, RequestState::TimedOut).unwrap_or_default();
        let partial_output = transport.partial_output();
        if let Some(partial) = &partial_output {
            debug!("Partial output at timeout: {}", partial);
        }
        McpError::Timeout {
            id: id.clone(),
            method: method.to_string(),
            elapsed,
            partial_output,
        }
    }

    async fn aborted(
        &mut self,
        transport: &mut dyn McpTransport,
        id: &RequestId,
        method: &str,
        exit_code: Option<i32>,
    ) -> McpError {
        self.finish(id, RequestState::Aborted);
        McpError::ProcessTerminated {
            id: Some(id.clone()),
            method: Some(method.to_string()),
            exit_code,
            stderr: transport.stderr_output().await,
        }
    }

    /// Remove `id` from the table, returning how long it was outstanding
    fn finish(&mut self, id: &RequestId, state: RequestState) -> Option<Duration> {
        debug_assert!(state.is_terminal());
        self.parked.remove(id);
        let mut entry = self.pending.remove(id)?;
        entry.state = state;
        let elapsed = entry.sent_at.elapsed();
        debug!(%id, method = %entry.method, state = ?entry.state, ?elapsed, "request finished");
        Some(elapsed)
    }
}

/// Poll liveness for up to `within` (at least [`EXIT_SETTLE`]); the exit code
/// once the server is gone.
///
/// A closed pipe or a failed write usually precedes the moment the exit can
/// be reaped by a few milliseconds.
pub(crate) async fn wait_for_exit(
    transport: &mut dyn McpTransport,
    within: Duration,
) -> Option<Option<i32>> {
    let give_up = Instant::now() + within.max(EXIT_SETTLE);
    loop {
        if let Liveness::Exited(code) = transport.liveness() {
            return Some(code);
        }
        if Instant::now() >= give_up {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
