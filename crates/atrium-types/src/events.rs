use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{RoomId, UserId};

/// Events fanned out to room subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RoomEvent {
    /// Something happened in a room that its members should hear about
    Notification {
        room_id: RoomId,
        user_id: UserId,
        text: String,
        timestamp: DateTime<Utc>,
    },
}

impl RoomEvent {
    pub fn room_id(&self) -> RoomId {
        match self {
            Self::Notification { room_id, .. } => *room_id,
        }
    }
}
