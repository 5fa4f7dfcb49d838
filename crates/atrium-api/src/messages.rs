use axum::{
    Json,
    extract::{
        Multipart, Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use axum::extract::multipart::{MultipartError, MultipartRejection};
use tracing::{debug, warn};

use atrium_types::api::{RoomParams, SearchParams, SendMessageRequest};
use atrium_types::{MessageId, RoomId, UserId};

use crate::error::ApiError;
use crate::notify::{Dispatcher, RoomSubscription};
use crate::service::{AppState, FileUpload};

/// POST /api/messages/upload — multipart form with `file`, `room_id` and
/// `user_id`. Unknown fields are skipped.
pub async fn upload_file(
    State(service): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let mut multipart = multipart.map_err(|e| multipart_error(e.status(), e.body_text()))?;

    let mut upload = None;
    let mut room_id = None;
    let mut user_id = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().map(|s| s.to_string());
                let data = field.bytes().await.map_err(bad_multipart)?;
                upload = Some(FileUpload { data, file_name });
            }
            Some("room_id") => {
                room_id = Some(field.text().await.map_err(bad_multipart)?.parse::<RoomId>()?);
            }
            Some("user_id") => {
                user_id = Some(field.text().await.map_err(bad_multipart)?.parse::<UserId>()?);
            }
            other => warn!("Ignoring unexpected upload field {:?}", other),
        }
    }

    let upload = upload.ok_or_else(|| missing("file"))?;
    let room_id = room_id.ok_or_else(|| missing("room_id"))?;
    let user_id = user_id.ok_or_else(|| missing("user_id"))?;

    let response = service.upload_file(upload, room_id, user_id).await?;
    Ok(Json(response))
}

/// POST /api/messages/send — JSON `{user_id, room_id, content}`.
pub async fn send_message(
    State(service): State<AppState>,
    body: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let response = service.send_message(req.content, req.room_id, req.user_id).await?;
    Ok(Json(response))
}

/// GET /api/messages/search?query=..&room_id=..
pub async fn search_messages(
    State(service): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let messages = service.search_messages(&params.query, params.room_id).await?;
    Ok(Json(messages))
}

/// DELETE /api/messages/{message_id}
pub async fn delete_message(
    State(service): State<AppState>,
    message_id: Result<Path<MessageId>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(message_id) = message_id.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    service.delete_message(message_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/messages?room_id=..
pub async fn list_messages(
    State(service): State<AppState>,
    params: Result<Query<RoomParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let messages = service.list_room_messages(params.room_id).await?;
    Ok(Json(messages))
}

/// GET /api/messages/events?room_id=.. — WebSocket feed of the room's events.
pub async fn room_events(
    State(dispatcher): State<Dispatcher>,
    params: Result<Query<RoomParams>, QueryRejection>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let events = dispatcher.subscribe_room(params.room_id);
    Ok(ws.on_upgrade(move |socket| relay_events(socket, events)))
}

async fn relay_events(mut socket: WebSocket, mut events: RoomSubscription) {
    debug!("Room {} subscriber connected", events.room_id());
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let json = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to encode room event: {}", e);
                        continue;
                    }
                };
                if socket.send(WsMessage::Text(json.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    }
    debug!("Room {} subscriber disconnected", events.room_id());
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

fn bad_multipart(e: MultipartError) -> ApiError {
    multipart_error(e.status(), e.body_text())
}

/// Body-limit failures keep their 413; every other multipart problem is a 400.
fn multipart_error(status: StatusCode, text: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(text)
    } else {
        ApiError::BadRequest(text)
    }
}

fn missing(field: &str) -> ApiError {
    ApiError::BadRequest(format!("missing field '{}'", field))
}
