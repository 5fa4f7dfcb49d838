use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, RoomId, UserId};

// -- Upload --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub id: MessageId,
    pub file_url: String,
}

// -- Text messages --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub user_id: UserId,
    pub room_id: RoomId,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub id: MessageId,
    pub sent: bool,
}

// -- Search --

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
    pub room_id: RoomId,
}

// -- Room listing --

#[derive(Debug, Deserialize)]
pub struct RoomParams {
    pub room_id: RoomId,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
