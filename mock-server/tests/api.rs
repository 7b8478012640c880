use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{
    app, app_with_token, Caption, AUTH_HEADER, BINARY_BODY, CAT_PNG, NORMAL_CAPTION, SHORT_CAPTION,
};
use tower::ServiceExt;

const IMAGE: &str = "data:image/jpeg;base64,AAA";

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(uri: &str, body: serde_json::Value) -> Request<String> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

// --- caption ---

#[tokio::test]
async fn caption_defaults_to_normal_length() {
    let resp = app()
        .oneshot(json_request("/caption", serde_json::json!({"image_url": IMAGE})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let caption: Caption = body_json(resp).await;
    assert_eq!(caption.caption, NORMAL_CAPTION);
    assert!(!caption.request_id.is_empty());
}

#[tokio::test]
async fn caption_stream_returns_event_stream() {
    let resp = app()
        .oneshot(json_request(
            "/caption",
            serde_json::json!({"image_url": IMAGE, "length": "short", "stream": true}),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[http::header::CONTENT_TYPE], "text/event-stream");
    let body = String::from_utf8(body_bytes(resp).await.to_vec()).unwrap();
    assert_eq!(body.matches("event: chunk").count(), 4);
    assert!(body.contains(&format!("\"caption\":\"{SHORT_CAPTION}\"")));
}

#[tokio::test]
async fn caption_rejects_plain_urls() {
    let resp = app()
        .oneshot(json_request("/caption", serde_json::json!({"image_url": "https://x/cat.jpg"})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- detect / point / query ---

#[tokio::test]
async fn detect_finds_cats() {
    let resp = app()
        .oneshot(json_request("/detect", serde_json::json!({"image_url": IMAGE, "object": "cat"})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["objects"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn point_without_matches_is_empty() {
    let resp = app()
        .oneshot(json_request("/point", serde_json::json!({"image_url": IMAGE, "object": "dog"})))
        .await
        .unwrap();

    let body: serde_json::Value = body_json(resp).await;
    assert!(body["points"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn query_echoes_question() {
    let resp = app()
        .oneshot(json_request("/query", serde_json::json!({"image_url": IMAGE, "question": "Why?"})))
        .await
        .unwrap();

    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["answer"], "You asked: Why?");
}

#[tokio::test]
async fn query_missing_question_returns_422() {
    let resp = app()
        .oneshot(json_request("/query", serde_json::json!({"image_url": IMAGE})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- auth ---

#[tokio::test]
async fn missing_token_is_401() {
    let resp = app_with_token("secret")
        .oneshot(json_request("/query", serde_json::json!({"image_url": IMAGE, "question": "?"})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_bytes(resp).await, "unauthorized");
}

#[tokio::test]
async fn wrong_token_is_403() {
    let mut req = json_request("/query", serde_json::json!({"image_url": IMAGE, "question": "?"}));
    req.headers_mut().insert(AUTH_HEADER, "guess".parse().unwrap());
    let resp = app_with_token("secret").oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn right_token_is_accepted() {
    let mut req = json_request("/query", serde_json::json!({"image_url": IMAGE, "question": "?"}));
    req.headers_mut().insert(AUTH_HEADER, "secret".parse().unwrap());
    let resp = app_with_token("secret").oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
}

// --- canned responses ---

#[tokio::test]
async fn status_route_echoes_code() {
    let resp = app()
        .oneshot(Request::builder().uri("/status/503").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_bytes(resp).await, "status 503");
}

#[tokio::test]
async fn image_route_serves_png() {
    let resp = app()
        .oneshot(Request::builder().uri("/images/cat.png").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.headers()[http::header::CONTENT_TYPE], "image/png");
    assert_eq!(body_bytes(resp).await, CAT_PNG);
}

#[tokio::test]
async fn binary_route_sends_undecodable_body() {
    let resp = app()
        .oneshot(Request::builder().uri("/binary/401").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_bytes(resp).await, BINARY_BODY);
}

#[tokio::test]
async fn slow_stream_emits_numbered_events() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/stream/slow?events=3&interval_ms=1")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.headers()[http::header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(body_bytes(resp).await, "data: 1\n\ndata: 2\n\ndata: 3\n\n");
}
