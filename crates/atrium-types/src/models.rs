use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, RoomId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Message type tag, stored and serialized as a lowercase string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    File,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::File => "file",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "file" => Ok(Self::File),
            other => Err(format!("unknown message type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub user_id: UserId,
    pub room_id: RoomId,
    pub file_url: Option<String>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A message that has not been persisted yet. Storage assigns the id and
/// creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub user_id: UserId,
    pub room_id: RoomId,
    pub file_url: Option<String>,
    pub kind: MessageKind,
    pub content: String,
}

impl NewMessage {
    pub fn text(user_id: UserId, room_id: RoomId, content: String) -> Self {
        Self {
            user_id,
            room_id,
            file_url: None,
            kind: MessageKind::Text,
            content,
        }
    }

    pub fn file(user_id: UserId, room_id: RoomId, file_url: String, file_name: String) -> Self {
        Self {
            user_id,
            room_id,
            file_url: Some(file_url),
            kind: MessageKind::File,
            content: file_name,
        }
    }
}
