use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use tokio::sync::broadcast;
use tower::ServiceExt;

use atrium_api::cache::MemoryCache;
use atrium_api::notify::Dispatcher;
use atrium_api::object_store::LocalObjectStore;
use atrium_api::routes::router;
use atrium_api::store::SqliteStore;
use atrium_api::MessageService;
use atrium_db::Database;
use atrium_types::api::{ErrorBody, SendMessageResponse, UploadResponse};
use atrium_types::events::RoomEvent;
use atrium_types::models::{Message, MessageKind};

const BOUNDARY: &str = "atrium-test-boundary";
const BASE_URL: &str = "http://test.local";
const MAX_UPLOAD_BYTES: usize = 1024 * 1024;

struct TestApp {
    router: Router,
    events: broadcast::Receiver<RoomEvent>,
    upload_dir: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.upload_dir).ok();
    }
}

async fn app() -> TestApp {
    let db = Database::open_in_memory().unwrap();
    db.create_user(1, "alice").unwrap();
    db.create_user(2, "bob").unwrap();

    let upload_dir = std::env::temp_dir().join(format!("atrium-http-{}", uuid::Uuid::new_v4()));
    let objects = LocalObjectStore::new(upload_dir.clone(), BASE_URL).await.unwrap();
    let dispatcher = Dispatcher::new();
    let events = dispatcher.subscribe();

    let service = MessageService::new(
        Arc::new(SqliteStore::new(Arc::new(db))),
        Arc::new(objects),
        Arc::new(MemoryCache::new()),
        Arc::new(dispatcher.clone()),
    );

    TestApp {
        router: router(Arc::new(service), dispatcher, &upload_dir, MAX_UPLOAD_BYTES),
        events,
        upload_dir,
    }
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a [u8]),
}

fn multipart(parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(file_name, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        file_name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/messages/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &TestApp, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

async fn upload(app: &TestApp, room: &str, user: &str, name: &str, data: &[u8]) -> UploadResponse {
    let (status, body) = send(
        app,
        multipart(&[
            Part::Text("room_id", room),
            Part::Text("user_id", user),
            Part::File(name, data),
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&body));
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn upload_stores_file_and_notifies_room() {
    let mut app = app().await;

    let resp = upload(&app, "7", "1", "minutes.txt", b"agenda").await;
    assert!(resp.file_url.starts_with("http://test.local/files/"));

    let path = resp.file_url.strip_prefix(BASE_URL).unwrap().to_string();
    let (status, body) = send(&app, get(&path)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"agenda");

    match app.events.try_recv().unwrap() {
        RoomEvent::Notification { room_id, user_id, text, .. } => {
            assert_eq!(room_id.get(), 7);
            assert_eq!(user_id.get(), 1);
            assert_eq!(text, "New file uploaded");
        }
    }
}

#[tokio::test]
async fn uploaded_files_are_served_as_opaque_downloads() {
    let app = app().await;

    let resp = upload(&app, "1", "1", "evil.html", b"<script>alert(1)</script>").await;
    assert!(resp.file_url.ends_with(".html"));

    let path = resp.file_url.strip_prefix(BASE_URL).unwrap().to_string();
    let resp = app.router.clone().oneshot(get(&path)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let headers = resp.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "application/octet-stream");
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::CONTENT_DISPOSITION], "attachment");
}

#[tokio::test]
async fn oversized_upload_is_413() {
    let mut app = app().await;
    let big = vec![b'x'; 2 * MAX_UPLOAD_BYTES];

    let (status, body) = send(
        &app,
        multipart(&[
            Part::Text("room_id", "1"),
            Part::Text("user_id", "1"),
            Part::File("big.bin", &big),
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    let err: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert!(!err.error.is_empty());
    assert!(app.events.try_recv().is_err());
}

#[tokio::test]
async fn upload_response_uses_camel_case() {
    let app = app().await;
    let (status, body) = send(
        &app,
        multipart(&[
            Part::Text("room_id", "1"),
            Part::Text("user_id", "2"),
            Part::File("a.bin", b"x"),
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["id"].is_i64());
    assert!(json["fileUrl"].is_string());
}

#[tokio::test]
async fn upload_for_unknown_user_is_404_with_empty_body() {
    let mut app = app().await;

    let (status, body) = send(
        &app,
        multipart(&[
            Part::Text("room_id", "1"),
            Part::Text("user_id", "99"),
            Part::File("a.txt", b"x"),
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.is_empty());
    assert!(app.events.try_recv().is_err());

    let (_, body) = send(&app, get("/api/messages?room_id=1")).await;
    let listed: Vec<Message> = serde_json::from_slice(&body).unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn malformed_upload_fields_are_rejected() {
    let app = app().await;

    let cases = [
        multipart(&[
            Part::Text("room_id", "1"),
            Part::Text("user_id", "-4"),
            Part::File("a.txt", b"x"),
        ]),
        multipart(&[
            Part::Text("room_id", "lobby"),
            Part::Text("user_id", "1"),
            Part::File("a.txt", b"x"),
        ]),
        multipart(&[Part::Text("room_id", "1"), Part::Text("user_id", "1")]),
        multipart(&[Part::Text("user_id", "1"), Part::File("a.txt", b"x")]),
    ];

    for req in cases {
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorBody = serde_json::from_slice(&body).unwrap();
        assert!(!err.error.is_empty());
    }
}

#[tokio::test]
async fn upload_without_multipart_body_is_bad_request() {
    let app = app().await;
    let req = Request::builder()
        .method("POST")
        .uri("/api/messages/upload")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();

    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn send_creates_searchable_text_message() {
    let mut app = app().await;

    let (status, body) = send(
        &app,
        post_json(
            "/api/messages/send",
            serde_json::json!({ "user_id": 2, "room_id": 8, "content": "release is out" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&body));
    let sent: SendMessageResponse = serde_json::from_slice(&body).unwrap();
    assert!(sent.sent);

    match app.events.try_recv().unwrap() {
        RoomEvent::Notification { room_id, user_id, text, .. } => {
            assert_eq!(room_id.get(), 8);
            assert_eq!(user_id.get(), 2);
            assert_eq!(text, "New message");
        }
    }

    let (_, body) = send(&app, get("/api/messages/search?query=release&room_id=8")).await;
    let hits: Vec<Message> = serde_json::from_slice(&body).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, sent.id);
    assert_eq!(hits[0].kind, MessageKind::Text);
    assert_eq!(hits[0].file_url, None);
}

#[tokio::test]
async fn send_rejects_unknown_users_and_bad_bodies() {
    let app = app().await;

    let (status, body) = send(
        &app,
        post_json(
            "/api/messages/send",
            serde_json::json!({ "user_id": 99, "room_id": 1, "content": "hi" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.is_empty());

    for bad in [
        serde_json::json!({ "user_id": 0, "room_id": 1, "content": "hi" }),
        serde_json::json!({ "user_id": 1, "room_id": 1 }),
        serde_json::json!({ "user_id": 1, "room_id": 1, "content": "  " }),
    ] {
        let (status, _) = send(&app, post_json("/api/messages/send", bad.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", bad);
    }
}

#[tokio::test]
async fn events_route_requires_websocket_upgrade() {
    let app = app().await;
    let (status, _) = send(&app, get("/api/messages/events?room_id=1")).await;
    assert!(status.is_client_error(), "{}", status);
    assert_ne!(status, StatusCode::NOT_FOUND);
    assert_ne!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn search_finds_file_messages_by_name() {
    let app = app().await;
    upload(&app, "3", "1", "budget-2024.xlsx", b"1").await;
    upload(&app, "3", "2", "holiday.jpg", b"2").await;
    upload(&app, "4", "1", "budget-old.xlsx", b"3").await;

    let (status, body) = send(&app, get("/api/messages/search?query=budget&room_id=3")).await;
    assert_eq!(status, StatusCode::OK);

    let hits: Vec<Message> = serde_json::from_slice(&body).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].content, "budget-2024.xlsx");
    assert_eq!(hits[0].kind, MessageKind::File);
    assert_eq!(hits[0].room_id.get(), 3);
}

#[tokio::test]
async fn search_sees_uploads_made_after_a_cached_search() {
    let app = app().await;
    upload(&app, "3", "1", "notes.md", b"1").await;

    let (_, body) = send(&app, get("/api/messages/search?query=notes&room_id=3")).await;
    assert_eq!(serde_json::from_slice::<Vec<Message>>(&body).unwrap().len(), 1);

    upload(&app, "3", "1", "notes-2.md", b"2").await;

    let (_, body) = send(&app, get("/api/messages/search?query=notes&room_id=3")).await;
    assert_eq!(serde_json::from_slice::<Vec<Message>>(&body).unwrap().len(), 2);
}

#[tokio::test]
async fn search_rejects_bad_room_ids() {
    let app = app().await;
    for uri in [
        "/api/messages/search?query=a&room_id=0",
        "/api/messages/search?query=a&room_id=abc",
        "/api/messages/search?query=a",
    ] {
        let (status, _) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
    }
}

#[tokio::test]
async fn delete_removes_message_then_404s() {
    let app = app().await;
    let resp = upload(&app, "5", "1", "old.log", b"x").await;

    let (_, body) = send(&app, get("/api/messages?room_id=5")).await;
    assert_eq!(serde_json::from_slice::<Vec<Message>>(&body).unwrap().len(), 1);

    let uri = format!("/api/messages/{}", resp.id);
    let (status, body) = send(&app, delete(&uri)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());

    let (_, body) = send(&app, get("/api/messages?room_id=5")).await;
    assert!(serde_json::from_slice::<Vec<Message>>(&body).unwrap().is_empty());

    let (status, body) = send(&app, delete(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.is_empty());
}

#[tokio::test]
async fn delete_rejects_malformed_ids() {
    let app = app().await;
    for uri in ["/api/messages/abc", "/api/messages/0", "/api/messages/-2"] {
        let (status, _) = send(&app, delete(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
    }
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app().await;
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}
