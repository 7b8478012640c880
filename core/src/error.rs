//! Error types for the vision API client.
//!
//! # Design
//! 401, 403 and 404 each get a dedicated variant because callers react to
//! them differently (re-authenticate, give up, fix the path). Every other
//! failure, including network errors and unparsable bodies, lands in
//! `Server`. All variants carry the raw upstream text so the diagnostic the
//! API sent back is never lost.

use thiserror::Error;

/// Errors returned by transports, the event-stream decoder and task calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The server returned 401.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The server returned 403.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The server returned 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-2xx status, a transport failure, or a body that could
    /// not be read or parsed. `status` is `None` when no response was seen
    /// or the failure happened after a successful status line.
    #[error("server error{}: {message}", status_suffix(.status))]
    Server { status: Option<u16>, message: String },

    /// The client was set up with invalid settings.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ApiError {
    /// Map a non-success status code and its raw body to an error variant.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 => ApiError::Unauthorized(body),
            403 => ApiError::Forbidden(body),
            404 => ApiError::NotFound(body),
            _ => ApiError::Server {
                status: Some(status),
                message: body,
            },
        }
    }

    /// A `Server` error with no associated status.
    pub fn server(message: impl Into<String>) -> Self {
        ApiError::Server {
            status: None,
            message: message.into(),
        }
    }

    /// The raw response body or failure detail carried by this error.
    pub fn detail(&self) -> &str {
        match self {
            ApiError::Unauthorized(body) | ApiError::Forbidden(body) | ApiError::NotFound(body) => body,
            ApiError::Server { message, .. } => message,
            ApiError::Configuration(msg) => msg,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {code})"),
        None => String::new(),
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::server(err.to_string())
    }
}

/// Agents never treat statuses as errors, so a `ureq::Error` is always a
/// transport failure.
impl From<ureq::Error> for ApiError {
    fn from(err: ureq::Error) -> Self {
        ApiError::server(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_is_exact() {
        assert_eq!(ApiError::from_status(401, "unauthorized"), ApiError::Unauthorized("unauthorized".into()));
        assert_eq!(ApiError::from_status(403, "nope"), ApiError::Forbidden("nope".into()));
        assert_eq!(ApiError::from_status(404, "gone"), ApiError::NotFound("gone".into()));
        for status in [400, 409, 422, 429, 500, 502, 503] {
            let err = ApiError::from_status(status, "boom");
            assert_eq!(
                err,
                ApiError::Server {
                    status: Some(status),
                    message: "boom".into()
                }
            );
        }
    }

    #[test]
    fn detail_returns_raw_body() {
        assert_eq!(ApiError::from_status(401, "bad token").detail(), "bad token");
        assert_eq!(ApiError::from_status(500, "{\"error\":\"x\"}").detail(), "{\"error\":\"x\"}");
        assert_eq!(ApiError::Configuration("no url".into()).detail(), "no url");
    }

    #[test]
    fn display_includes_status_when_known() {
        let err = ApiError::from_status(502, "bad gateway");
        assert_eq!(err.to_string(), "server error (HTTP 502): bad gateway");
        assert_eq!(ApiError::server("reset").to_string(), "server error: reset");
    }

    #[test]
    fn ureq_errors_are_transport_failures() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: ApiError = ureq::Error::Io(io).into();
        assert!(matches!(err, ApiError::Server { status: None, .. }));
    }

    #[test]
    fn json_errors_become_server_errors() {
        let err: ApiError = serde_json::from_str::<serde_json::Value>("not json").unwrap_err().into();
        assert!(matches!(err, ApiError::Server { status: None, .. }));
    }
}
