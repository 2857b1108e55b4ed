//! Newline-delimited JSON-RPC codec
//!
//! One message per line, in both directions. Anything on the server's output
//! that does not decode to an envelope is a [`CodecError`], which the
//! correlator skips as noise.

use crate::error::McpError;
use crate::protocol::{McpMessage, McpNotification, McpRequest, McpResponse, RequestId};
use serde_json::{Map, Value};
use thiserror::Error;

/// Why a line is not a protocol envelope
#[derive(Debug, Error)]
pub enum CodecError {
    /// Blank line
    #[error("empty line")]
    Empty,

    /// Not valid JSON
    #[error("not JSON: {0}")]
    NotJson(#[from] serde_json::Error),

    /// Valid JSON, but not an object
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// An object that is not a request, response or notification
    #[error("not a JSON-RPC envelope: {0}")]
    NotAnEnvelope(&'static str),
}

/// Serialize a message as exactly one line, terminator included
pub fn encode(message: &McpMessage) -> Result<String, McpError> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

/// Classify one line of server output
pub fn decode(line: &str) -> Result<McpMessage, CodecError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(CodecError::Empty);
    }

    let value: Value = serde_json::from_str(line)?;
    let mut object = match value {
        Value::Object(object) => object,
        other => return Err(CodecError::NotAnObject(kind_of(&other))),
    };

    let jsonrpc = match object.remove("jsonrpc") {
        Some(Value::String(version)) => version,
        _ => crate::protocol::JSONRPC_VERSION.to_string(),
    };
    let id = take_id(&mut object)?;
    let method = match object.remove("method") {
        Some(Value::String(method)) => Some(method),
        Some(_) => return Err(CodecError::NotAnEnvelope("method is not a string")),
        None => None,
    };
    let params = object.remove("params");

    match (id, method) {
        (Some(id), Some(method)) => Ok(McpMessage::Request(McpRequest {
            jsonrpc,
            id,
            method,
            params,
        })),
        (Some(id), None) => {
            let result = object.remove("result");
            let error = object.remove("error");
            match (&result, &error) {
                (Some(_), None) | (None, Some(_)) => Ok(McpMessage::Response(McpResponse {
                    jsonrpc,
                    id,
                    result,
                    error,
                })),
                (Some(_), Some(_)) => Err(CodecError::NotAnEnvelope(
                    "response carries both result and error",
                )),
                (None, None) => Err(CodecError::NotAnEnvelope(
                    "response carries neither result nor error",
                )),
            }
        }
        (None, Some(method)) => Ok(McpMessage::Notification(McpNotification {
            jsonrpc,
            method,
            params,
        })),
        (None, None) => Err(CodecError::NotAnEnvelope("no id and no method")),
    }
}

// `id: null` is what servers send when they could not read the request id;
// nothing can be correlated with it, so it counts as absent.
fn take_id(object: &mut Map<String, Value>) -> Result<Option<RequestId>, CodecError> {
    match object.remove("id") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(|n| Some(RequestId::Number(n)))
            .ok_or(CodecError::NotAnEnvelope("id is not an integer")),
        Some(Value::String(s)) => Ok(Some(RequestId::String(s))),
        Some(_) => Err(CodecError::NotAnEnvelope("id is neither number nor string")),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
