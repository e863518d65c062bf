//! Room gateway wire format.
//!
//! Inbound frames are `{"type": ..., "data": {...}}`. Outbound frames are the
//! connect-time snapshot `{"comments": [...]}` followed by typed events.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::message::Message;

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// First frame of every session: the room's message log, oldest first.
#[derive(Debug, Serialize)]
pub struct Snapshot<'a> {
    pub comments: &'a [Message],
}

/// Events pushed to a session, either fanned out to the whole room or sent
/// only to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    NewMessage { comment: Message },
    /// Tells clients to reload; carries no ids.
    DeleteMessages,
    Error { error_message: String },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            error_message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawClientEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Default, Deserialize)]
struct NewMessageData {
    #[serde(default)]
    body: String,
}

/// Snowflake ids arrive as strings; plain numbers are accepted too.
#[derive(Debug, Deserialize)]
struct WireId(#[serde(with = "debate_common::snowflake::as_string")] i64);

#[derive(Debug, Default, Deserialize)]
struct DeleteMessagesData {
    #[serde(default)]
    ids: Vec<WireId>,
}

/// A decoded inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    NewMessage { body: String },
    DeleteMessages { ids: Vec<i64> },
    JoinTeam,
    LeaveTeam,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Invalid event format")]
    Malformed,
    #[error("Unknown event type: {0}")]
    UnknownType(String),
    #[error("Invalid data for {0}")]
    InvalidData(&'static str),
}

impl ClientEvent {
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let raw: RawClientEvent = serde_json::from_str(text).map_err(|_| DecodeError::Malformed)?;
        let data = if raw.data.is_null() {
            Value::Object(Default::default())
        } else {
            raw.data
        };

        match raw.kind.as_str() {
            "new_message" => {
                let data: NewMessageData = serde_json::from_value(data)
                    .map_err(|_| DecodeError::InvalidData("new_message"))?;
                Ok(ClientEvent::NewMessage { body: data.body })
            }
            "delete_messages" => {
                let data: DeleteMessagesData = serde_json::from_value(data)
                    .map_err(|_| DecodeError::InvalidData("delete_messages"))?;
                Ok(ClientEvent::DeleteMessages {
                    ids: data.ids.into_iter().map(|WireId(id)| id).collect(),
                })
            }
            "join_team" => Ok(ClientEvent::JoinTeam),
            "leave_team" => Ok(ClientEvent::LeaveTeam),
            other => Err(DecodeError::UnknownType(other.to_string())),
        }
    }
}
