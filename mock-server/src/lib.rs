use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use futures::stream;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{debug, info};
use uuid::Uuid;

pub const AUTH_HEADER: &str = "x-moondream-auth";

/// Caption the mock returns for `"short"` requests.
pub const SHORT_CAPTION: &str = "A brown tabby cat";
pub const NORMAL_CAPTION: &str = "A brown tabby cat sitting on a sunny wooden windowsill.";

/// Bytes served at `/images/cat.png`.
pub const CAT_PNG: &[u8] = b"\x89PNG\r\n\x1a\ncat";

/// Body served by `/binary/{code}`.
pub const BINARY_BODY: &[u8] = b"\xff\xfe";

#[derive(Debug, Deserialize)]
pub struct CaptionInput {
    pub image_url: String,
    #[serde(default = "default_length")]
    pub length: String,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Deserialize)]
pub struct ObjectInput {
    pub image_url: String,
    pub object: String,
}

#[derive(Debug, Deserialize)]
pub struct QueryInput {
    pub image_url: String,
    pub question: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Caption {
    pub request_id: String,
    pub caption: String,
}

fn default_length() -> String {
    "normal".to_string()
}

#[derive(Debug, Default)]
struct Settings {
    access_token: Option<String>,
}

type AppState = Arc<Settings>;

/// Router that accepts any caller.
pub fn app() -> Router {
    router(Settings::default())
}

/// Router that rejects task calls without `x-moondream-auth: <token>`.
pub fn app_with_token(token: &str) -> Router {
    router(Settings {
        access_token: Some(token.to_string()),
    })
}

fn router(settings: Settings) -> Router {
    Router::new()
        .route("/caption", post(caption))
        .route("/detect", post(detect))
        .route("/point", post(point))
        .route("/query", post(query))
        .route("/status/{code}", get(status).post(status))
        .route("/broken", post(broken))
        .route("/binary/{code}", get(binary_status).post(binary_status))
        .route("/stream/broken", post(broken_stream))
        .route("/stream/slow", post(slow_stream))
        .route("/images/cat.png", get(cat_png))
        .with_state(Arc::new(settings))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    info!(addr = ?listener.local_addr()?, "mock vision API listening");
    axum::serve(listener, app()).await
}

pub async fn run_with_token(listener: TcpListener, token: &str) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_token(token)).await
}

/// Split a caption into word chunks, each keeping its trailing space.
pub fn caption_chunks(caption: &str) -> Vec<String> {
    caption.split_inclusive(' ').map(str::to_string).collect()
}

/// Render a caption stream as an SSE body. Uses CRLF line endings and a
/// leading comment so clients have to normalize.
pub fn caption_event_stream(caption: &str) -> String {
    let mut body = String::from(": caption stream\r\nretry: 1000\r\n\r\n");
    for chunk in caption_chunks(caption) {
        body.push_str("event: chunk\r\n");
        body.push_str(&format!("data: {}\r\n\r\n", json!({ "chunk": chunk })));
    }
    body.push_str("event: done\r\n");
    body.push_str(&format!("data: {}\r\n\r\n", json!({ "caption": caption, "completed": true })));
    body
}

fn authorize(settings: &Settings, headers: &HeaderMap) -> Result<(), Response> {
    let Some(expected) = &settings.access_token else {
        return Ok(());
    };
    match headers.get(AUTH_HEADER).and_then(|v| v.to_str().ok()) {
        Some(token) if token == expected => Ok(()),
        Some(_) => Err((StatusCode::FORBIDDEN, "forbidden").into_response()),
        None => Err((StatusCode::UNAUTHORIZED, "unauthorized").into_response()),
    }
}

fn require_data_url(image_url: &str) -> Result<(), Response> {
    if image_url.starts_with("data:") {
        return Ok(());
    }
    Err((StatusCode::BAD_REQUEST, "image_url must be a data URL").into_response())
}

fn request_id() -> String {
    Uuid::new_v4().to_string()
}

async fn caption(State(settings): State<AppState>, headers: HeaderMap, Json(input): Json<CaptionInput>) -> Response {
    if let Err(rejection) = authorize(&settings, &headers).and_then(|_| require_data_url(&input.image_url)) {
        return rejection;
    }
    let text = match input.length.as_str() {
        "short" => SHORT_CAPTION,
        _ => NORMAL_CAPTION,
    };
    debug!(length = %input.length, stream = input.stream, "caption");

    if input.stream {
        return (
            [(header::CONTENT_TYPE, "text/event-stream"), (header::CACHE_CONTROL, "no-store")],
            caption_event_stream(text),
        )
            .into_response();
    }
    Json(Caption {
        request_id: request_id(),
        caption: text.to_string(),
    })
    .into_response()
}

async fn detect(State(settings): State<AppState>, headers: HeaderMap, Json(input): Json<ObjectInput>) -> Response {
    if let Err(rejection) = authorize(&settings, &headers).and_then(|_| require_data_url(&input.image_url)) {
        return rejection;
    }
    let objects = match input.object.as_str() {
        "cat" => json!([
            {"x_min": 0.1, "y_min": 0.2, "x_max": 0.6, "y_max": 0.9},
            {"x_min": 0.65, "y_min": 0.3, "x_max": 0.95, "y_max": 0.8}
        ]),
        _ => json!([]),
    };
    Json(json!({ "request_id": request_id(), "objects": objects })).into_response()
}

async fn point(State(settings): State<AppState>, headers: HeaderMap, Json(input): Json<ObjectInput>) -> Response {
    if let Err(rejection) = authorize(&settings, &headers).and_then(|_| require_data_url(&input.image_url)) {
        return rejection;
    }
    let points = match input.object.as_str() {
        "cat" => json!([{"x": 0.35, "y": 0.55}, {"x": 0.8, "y": 0.55}]),
        _ => json!([]),
    };
    Json(json!({ "request_id": request_id(), "points": points })).into_response()
}

async fn query(State(settings): State<AppState>, headers: HeaderMap, Json(input): Json<QueryInput>) -> Response {
    if let Err(rejection) = authorize(&settings, &headers).and_then(|_| require_data_url(&input.image_url)) {
        return rejection;
    }
    Json(json!({
        "request_id": request_id(),
        "answer": format!("You asked: {}", input.question),
    }))
    .into_response()
}

/// Echo an arbitrary status with a recognizable body.
async fn status(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(status) => (status, format!("status {code}")).into_response(),
        Err(_) => (StatusCode::BAD_REQUEST, "invalid status code").into_response(),
    }
}

/// An arbitrary status whose body is not valid UTF-8.
async fn binary_status(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(status) => (status, [(header::CONTENT_TYPE, "text/plain")], BINARY_BODY).into_response(),
        Err(_) => (StatusCode::BAD_REQUEST, "invalid status code").into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct SlowStream {
    pub events: u32,
    pub interval_ms: u64,
}

/// `events` numbered events, the first immediately and the rest
/// `interval_ms` apart.
async fn slow_stream(Query(params): Query<SlowStream>) -> Response {
    let interval = Duration::from_millis(params.interval_ms);
    let total = params.events;
    let events = stream::unfold(1, move |n| async move {
        if n > total {
            return None;
        }
        if n > 1 {
            tokio::time::sleep(interval).await;
        }
        Some((Ok::<_, Infallible>(format!("data: {n}\n\n")), n + 1))
    });
    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        Body::from_stream(events),
    )
        .into_response()
}

async fn broken() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/json")], "not json")
}

/// One good event, then an event whose data is not JSON, then another good one.
async fn broken_stream() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        "data: {\"chunk\":\"ok\"}\n\ndata: {oops\n\ndata: {\"chunk\":\"never\"}\n\n",
    )
}

async fn cat_png() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], CAT_PNG)
}
