//! HTTP requests and responses as plain data.
//!
//! # Design
//! Transports never decide what goes on the wire. They receive a fully built
//! `HttpRequest` from the `build_*` functions here and hand the raw
//! `HttpResponse` back to `classify`. That keeps header policy and the
//! status-to-error mapping in one deterministic place that tests can reach
//! without a network.

use serde_json::Value;

use crate::config::Config;
use crate::error::ApiError;

pub const AUTH_HEADER: &str = "x-moondream-auth";
pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// An HTTP request described as plain data. Header names are lowercase and
/// unique.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// JSON POST with `accept: application/json`.
pub fn build_post(
    config: &Config,
    path: &str,
    payload: &Value,
    headers: &[(String, String)],
) -> Result<HttpRequest, ApiError> {
    let mut req = HttpRequest {
        method: HttpMethod::Post,
        url: config.url(path),
        headers: base_headers(config),
        body: Some(serde_json::to_string(&compact(payload))?),
    };
    set_header(&mut req.headers, "accept", JSON_CONTENT_TYPE);
    for (name, value) in headers {
        set_header(&mut req.headers, name, value);
    }
    Ok(req)
}

pub fn build_get(config: &Config, path: &str) -> HttpRequest {
    let mut headers = base_headers(config);
    set_header(&mut headers, "accept", JSON_CONTENT_TYPE);
    HttpRequest {
        method: HttpMethod::Get,
        url: config.url(path),
        headers,
        body: None,
    }
}

/// JSON POST asking for a `text/event-stream` response.
pub fn build_stream_post(
    config: &Config,
    path: &str,
    payload: &Value,
    headers: &[(String, String)],
) -> Result<HttpRequest, ApiError> {
    let mut req = build_post(config, path, payload, &[])?;
    set_header(&mut req.headers, "accept", EVENT_STREAM_CONTENT_TYPE);
    set_header(&mut req.headers, "cache-control", "no-store");
    for (name, value) in headers {
        set_header(&mut req.headers, name, value);
    }
    Ok(req)
}

/// Turn a response into its parsed JSON body or the matching `ApiError`.
pub fn classify(response: HttpResponse) -> Result<Value, ApiError> {
    check_status(response.status, &response.body)?;
    serde_json::from_str(&response.body).map_err(|e| ApiError::Server {
        status: Some(response.status),
        message: format!("invalid JSON response: {e}"),
    })
}

pub fn check_status(status: u16, body: &str) -> Result<(), ApiError> {
    if (200..300).contains(&status) {
        return Ok(());
    }
    Err(ApiError::from_status(status, body))
}

/// Drop null-valued top-level keys from an object payload.
pub fn compact(payload: &Value) -> Value {
    match payload {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn base_headers(config: &Config) -> Vec<(String, String)> {
    let mut headers = Vec::with_capacity(4);
    if let Some(token) = config.access_token() {
        headers.push((AUTH_HEADER.to_string(), token.to_string()));
    }
    headers.push(("content-type".to_string(), JSON_CONTENT_TYPE.to_string()));
    headers
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    let name = name.to_ascii_lowercase();
    match headers.iter_mut().find(|(k, _)| *k == name) {
        Some(entry) => entry.1 = value.to_string(),
        None => headers.push((name, value.to_string())),
    }
}
