//! Line relay between the client stream and the rmcp session.
//!
//! rmcp ends a session on the first line it cannot decode. Every inbound line
//! is checked here first: well-formed JSON-RPC messages are forwarded, anything
//! else is answered with a JSON-RPC error and the stream keeps going.

use rmcp::model::ClientJsonRpcMessage;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::io;
use std::sync::Mutex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Largest accepted message, in bytes
pub const MAX_MESSAGE_BYTES: usize = 4 * 1024 * 1024;

const DISCARD_CHUNK_BYTES: u64 = 64 * 1024;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

/// Client methods rmcp dispatches; failing to decode one of these is a params problem
const KNOWN_METHODS: &[&str] = &[
    "initialize",
    "ping",
    "tools/list",
    "tools/call",
    "resources/list",
    "resources/templates/list",
    "resources/read",
    "resources/subscribe",
    "resources/unsubscribe",
    "prompts/list",
    "prompts/get",
    "completion/complete",
    "logging/setLevel",
];

/// What to do with one inbound line
#[derive(Debug, PartialEq)]
pub enum Inbound {
    /// Hand to the session. `request_id` is set when a reply is owed.
    Forward {
        message: Vec<u8>,
        request_id: Option<String>,
    },
    /// Answer directly with this error response
    Reject(Value),
    /// Blank lines, stray responses and undecodable notifications
    Ignore,
}

pub fn error_response(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message.into()
        }
    })
}

/// Decide what happens to a raw line
pub fn classify(line: &[u8]) -> Inbound {
    let line = line.trim_ascii();
    if line.is_empty() {
        return Inbound::Ignore;
    }

    let Ok(text) = std::str::from_utf8(line) else {
        return Inbound::Reject(error_response(Value::Null, PARSE_ERROR, "Parse error: invalid UTF-8"));
    };
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            return Inbound::Reject(error_response(Value::Null, PARSE_ERROR, format!("Parse error: {}", e)));
        }
    };

    let Some(obj) = value.as_object() else {
        let message = if value.is_array() {
            "Batch requests are not supported"
        } else {
            "Request must be a JSON object"
        };
        return Inbound::Reject(error_response(Value::Null, INVALID_REQUEST, message));
    };

    let id = obj.get("id").cloned();
    let method = obj.get("method").and_then(Value::as_str);

    if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return Inbound::Reject(error_response(
            id.unwrap_or(Value::Null),
            INVALID_REQUEST,
            "jsonrpc must be '2.0'",
        ));
    }

    match serde_json::from_value::<ClientJsonRpcMessage>(value.clone()) {
        Ok(_) => {
            let request_id = match (method, &id) {
                (Some(_), Some(id)) => Some(id_key(id)),
                _ => None,
            };
            match serde_json::to_vec(&value) {
                Ok(message) => Inbound::Forward { message, request_id },
                Err(e) => Inbound::Reject(error_response(
                    id.unwrap_or(Value::Null),
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                )),
            }
        }
        Err(e) => match (method, id) {
            (Some(method), Some(id)) if KNOWN_METHODS.contains(&method) => {
                Inbound::Reject(error_response(id, INVALID_PARAMS, format!("Invalid params: {}", e)))
            }
            (Some(method), Some(id)) => Inbound::Reject(error_response(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", method),
            )),
            (Some(method), None) => {
                debug!("Ignoring notification {}: {}", method, e);
                Inbound::Ignore
            }
            (None, Some(id)) if obj.contains_key("result") || obj.contains_key("error") => {
                debug!("Ignoring unexpected response {}", id);
                Inbound::Ignore
            }
            (None, id) => Inbound::Reject(error_response(
                id.unwrap_or(Value::Null),
                INVALID_REQUEST,
                "Request is missing 'method'",
            )),
        },
    }
}

/// Map key for a JSON-RPC id
pub fn id_key(id: &Value) -> String {
    id.to_string()
}

/// The id of a response line written by the session, if it is one
pub fn response_id(line: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(line).ok()?;
    let obj = value.as_object()?;
    if obj.contains_key("method") {
        return None;
    }
    obj.get("id").filter(|id| !id.is_null()).map(id_key)
}

/// Outcome of reading one line
#[derive(Debug, PartialEq)]
pub enum LineRead {
    Eof,
    Line,
    /// The line exceeded `MAX_MESSAGE_BYTES` and was skipped up to its newline
    TooLong,
}

/// Read one newline-terminated line into `buf` without buffering more than
/// `MAX_MESSAGE_BYTES` of it
pub async fn read_line_capped<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let read = (&mut *reader)
        .take(MAX_MESSAGE_BYTES as u64 + 1)
        .read_until(b'\n', buf)
        .await?;
    if read == 0 {
        return Ok(LineRead::Eof);
    }
    if buf.len() <= MAX_MESSAGE_BYTES || buf.last() == Some(&b'\n') {
        return Ok(LineRead::Line);
    }

    buf.clear();
    loop {
        let read = (&mut *reader)
            .take(DISCARD_CHUNK_BYTES)
            .read_until(b'\n', buf)
            .await?;
        if read == 0 || buf.last() == Some(&b'\n') {
            break;
        }
        buf.clear();
    }
    buf.clear();
    warn!("Discarded message larger than {} bytes", MAX_MESSAGE_BYTES);
    Ok(LineRead::TooLong)
}

/// Request ids forwarded to the session and not answered yet
#[derive(Default)]
pub struct PendingReplies {
    ids: Mutex<HashSet<String>>,
    answered: Notify,
}

impl PendingReplies {
    pub fn insert(&self, id: String) {
        if let Ok(mut ids) = self.ids.lock() {
            ids.insert(id);
        }
    }

    pub fn remove(&self, id: &str) {
        if let Ok(mut ids) = self.ids.lock() {
            ids.remove(id);
        }
        self.answered.notify_one();
    }

    /// Forget everything; the session will not answer anymore
    pub fn clear(&self) {
        if let Ok(mut ids) = self.ids.lock() {
            ids.clear();
        }
        self.answered.notify_one();
    }

    fn is_empty(&self) -> bool {
        self.ids.lock().map(|ids| ids.is_empty()).unwrap_or(true)
    }

    /// Wait until every forwarded request got its reply
    pub async fn drained(&self) {
        while !self.is_empty() {
            self.answered.notified().await;
        }
    }
}
