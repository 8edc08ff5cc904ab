//! Action-level request/response contract used by board clients.
//!
//! A request is a JSON object `{"action": "...", ...fields}`. Every reply is a
//! JSON object with a boolean `success`, except `export`, which is a plain-text
//! attachment.

use chrono::Local;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{ChatError, Result};
use crate::model::MessageKind;
use crate::store::board::ChatBoard;
use crate::store::ledger;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    GetMessages { since: u64 },
    SendMessage { user: String, message: String },
    SystemMessage { message: String },
    Join { user: String },
    UpdatePresence { user: String },
    GetUsers,
    Leave { user: String },
    ClearMessages,
    Export,
}

impl Request {
    /// Parse a request envelope. Missing or mistyped fields become empty
    /// values and are rejected later by validation; only the action is strict.
    pub fn from_value(value: &Value) -> Result<Self> {
        let action = value.get("action").and_then(Value::as_str).unwrap_or("");
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string()
        };
        let request = match action {
            "get_messages" => Self::GetMessages {
                since: parse_since(value.get("since")),
            },
            "send_message" => Self::SendMessage {
                user: text("user"),
                message: text("message"),
            },
            "system_message" => Self::SystemMessage {
                message: text("message"),
            },
            "join" => Self::Join { user: text("user") },
            "update_presence" => Self::UpdatePresence { user: text("user") },
            "get_users" => Self::GetUsers,
            "leave" => Self::Leave { user: text("user") },
            "clear_messages" => Self::ClearMessages,
            "export" => Self::Export,
            other => return Err(ChatError::UnknownAction(other.to_string())),
        };
        Ok(request)
    }

    pub fn action(&self) -> &'static str {
        match self {
            Self::GetMessages { .. } => "get_messages",
            Self::SendMessage { .. } => "send_message",
            Self::SystemMessage { .. } => "system_message",
            Self::Join { .. } => "join",
            Self::UpdatePresence { .. } => "update_presence",
            Self::GetUsers => "get_users",
            Self::Leave { .. } => "leave",
            Self::ClearMessages => "clear_messages",
            Self::Export => "export",
        }
    }
}

/// `since` accepts an integer or a numeric string; anything else is 0.
fn parse_since(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Json(Value),
    Attachment { filename: String, body: String },
}

impl Reply {
    /// Body as sent to the client.
    pub fn render(&self) -> String {
        match self {
            Self::Json(v) => v.to_string(),
            Self::Attachment { body, .. } => body.clone(),
        }
    }
}

fn ok(payload: Value) -> Reply {
    let mut body = json!({ "success": true });
    if let (Value::Object(target), Value::Object(extra)) = (&mut body, payload) {
        target.extend(extra);
    }
    Reply::Json(body)
}

fn failure(err: &ChatError) -> Reply {
    match err {
        ChatError::InvalidInput(_) | ChatError::NameTaken(_) | ChatError::UnknownAction(_) => {
            debug!(code = err.code(), error = %err, "request rejected");
        }
        _ => warn!(code = err.code(), error = %err, "request failed"),
    }
    Reply::Json(json!({
        "success": false,
        "error": err.public_message(),
        "code": err.code(),
    }))
}

/// `update_presence` and `leave` reject an empty name with a bare failure.
fn silent_failure() -> Reply {
    Reply::Json(json!({ "success": false }))
}

/// Parse and run one raw request.
pub fn handle(board: &ChatBoard, raw: &Value) -> Reply {
    match Request::from_value(raw) {
        Ok(request) => dispatch(board, request),
        Err(err) => failure(&err),
    }
}

/// Run one parsed request against the board.
pub fn dispatch(board: &ChatBoard, request: Request) -> Reply {
    debug!(action = request.action(), "dispatching");
    match request {
        Request::GetMessages { since } => ok(json!({ "messages": board.ledger().query(since) })),
        Request::SendMessage { user, message } => {
            match board.ledger().append(&user, &message, MessageKind::User) {
                Ok(msg) => ok(json!({ "message": msg })),
                Err(err) => failure(&err),
            }
        }
        Request::SystemMessage { message } => {
            match board.ledger().append("", &message, MessageKind::System) {
                Ok(_) => ok(json!({})),
                Err(err) => failure(&err),
            }
        }
        Request::Join { user } => match board.roster().join(&user) {
            Ok(_) => ok(json!({})),
            Err(err) => failure(&err),
        },
        Request::UpdatePresence { user } => {
            if user.trim().is_empty() {
                return silent_failure();
            }
            match board.roster().heartbeat(&user) {
                Ok(_) => ok(json!({})),
                Err(err) => failure(&err),
            }
        }
        Request::GetUsers => match board.roster().prune_and_list_active() {
            Ok(users) => ok(json!({ "users": users })),
            Err(err) => failure(&err),
        },
        Request::Leave { user } => {
            if user.trim().is_empty() {
                return silent_failure();
            }
            match board.roster().leave(&user) {
                Ok(()) => ok(json!({})),
                Err(err) => failure(&err),
            }
        }
        Request::ClearMessages => match board.ledger().clear() {
            Ok(()) => ok(json!({})),
            Err(err) => failure(&err),
        },
        Request::Export => {
            let now = Local::now();
            Reply::Attachment {
                filename: ledger::export_filename(now),
                body: ledger::render_export(&board.ledger().export(), now),
            }
        }
    }
}
