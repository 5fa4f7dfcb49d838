use std::path::Path;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, header},
    routing::{delete, get, post},
};
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::messages;
use crate::notify::Dispatcher;
use crate::service::AppState;

/// Routes for the message resource, the room event feed, uploaded files and
/// health.
///
/// `upload_dir` is served read-only under `/files`, matching the URLs the
/// local object store hands out. Blobs always go out as opaque downloads,
/// whatever extension the uploader picked.
pub fn router(
    state: AppState,
    events: Dispatcher,
    upload_dir: &Path,
    max_upload_bytes: usize,
) -> Router {
    let message_routes = Router::new()
        .route("/", get(messages::list_messages))
        .route("/upload", post(messages::upload_file))
        .route("/send", post(messages::send_message))
        .route("/search", get(messages::search_messages))
        .route("/{message_id}", delete(messages::delete_message))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state);

    let event_routes = Router::new()
        .route("/events", get(messages::room_events))
        .with_state(events);

    let files = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_static("attachment"),
        ))
        .service(ServeDir::new(upload_dir));

    Router::new()
        .nest("/api/messages", message_routes.merge(event_routes))
        .nest_service("/files", files)
        .route("/health", get(messages::health))
}
