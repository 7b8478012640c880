//! Blocking HTTP transport.
//!
//! # Design
//! `Transport` is the seam between task calls and the network. Task code
//! only ever talks to the trait, so tests swap in an in-memory
//! implementation instead of patching a live client. `HttpTransport` is the
//! real thing: it builds requests with `crate::http`, runs them through a
//! `ureq` agent and leaves all status interpretation to `http::classify`.
//!
//! Every call blocks the calling thread. `execute` invokes the event handler
//! inline while reading the body, so the next chunk is not read until the
//! handler returns.
//!
//! The request timeout bounds a whole `post`, `get` or `download`. A stream
//! may legitimately outlive it, so `execute` uses a second agent where the
//! timeout only bounds connecting, sending and waiting for the response head.

use std::fmt;

use serde_json::Value;
use tracing::{debug, warn};
use ureq::http::Response;
use ureq::{Agent, Body};

use crate::config::Config;
use crate::error::ApiError;
use crate::http::{self, HttpMethod, HttpRequest, HttpResponse};
use crate::sse::{self, DecodedEvent};

/// The three operations task calls need from the network.
pub trait Transport {
    /// POST a JSON payload and return the parsed JSON body.
    fn post(&self, path: &str, payload: &Value, headers: &[(String, String)]) -> Result<Value, ApiError>;

    /// GET a path and return the parsed JSON body.
    fn get(&self, path: &str) -> Result<Value, ApiError>;

    /// POST a JSON payload and feed every event of the `text/event-stream`
    /// response to `on_event`, in arrival order, until the stream ends.
    fn execute(
        &self,
        path: &str,
        payload: &Value,
        headers: &[(String, String)],
        on_event: &mut dyn FnMut(DecodedEvent),
    ) -> Result<(), ApiError>;

    /// GET an absolute URL and return its raw bytes, whatever the status.
    fn download(&self, url: &str) -> Result<Download, ApiError>;
}

/// A resource fetched by `Transport::download`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Download {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// `Transport` over a blocking `ureq` agent.
#[derive(Clone)]
pub struct HttpTransport {
    config: Config,
    agent: Agent,
    stream_agent: Agent,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport").field("config", &self.config).finish_non_exhaustive()
    }
}

impl HttpTransport {
    pub fn new(config: Config) -> Self {
        let timeout = Some(config.request_timeout());
        let agent = Agent::config_builder()
            .timeout_global(timeout)
            .http_status_as_error(false)
            .build()
            .new_agent();
        let stream_agent = Agent::config_builder()
            .timeout_connect(timeout)
            .timeout_send_request(timeout)
            .timeout_recv_response(timeout)
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self {
            config,
            agent,
            stream_agent,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run a request and return the raw response with its body unread.
    fn send(&self, agent: &Agent, req: &HttpRequest) -> Result<Response<Body>, ApiError> {
        debug!(method = ?req.method, url = %req.url, "sending request");
        let response = match req.method {
            HttpMethod::Get => {
                let mut builder = agent.get(&req.url);
                for (name, value) in &req.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.call()?
            }
            HttpMethod::Post => {
                let mut builder = agent.post(&req.url);
                for (name, value) in &req.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.send(req.body.as_deref().unwrap_or_default().as_bytes())?
            }
        };
        debug!(status = response.status().as_u16(), url = %req.url, "received response");
        Ok(response)
    }

    fn round_trip(&self, req: HttpRequest) -> Result<Value, ApiError> {
        let response = into_http_response(self.send(&self.agent, &req)?)?;
        if !response.is_success() {
            warn!(status = response.status, url = %req.url, "request failed");
        }
        http::classify(response)
    }
}

impl Transport for HttpTransport {
    fn post(&self, path: &str, payload: &Value, headers: &[(String, String)]) -> Result<Value, ApiError> {
        self.round_trip(http::build_post(&self.config, path, payload, headers)?)
    }

    fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.round_trip(http::build_get(&self.config, path))
    }

    fn execute(
        &self,
        path: &str,
        payload: &Value,
        headers: &[(String, String)],
        on_event: &mut dyn FnMut(DecodedEvent),
    ) -> Result<(), ApiError> {
        let req = http::build_stream_post(&self.config, path, payload, headers)?;
        let mut response = self.send(&self.stream_agent, &req)?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = into_http_response(response)?.body;
            warn!(status, url = %req.url, "stream request failed");
            return Err(ApiError::from_status(status, body));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !content_type.starts_with(http::EVENT_STREAM_CONTENT_TYPE) {
            debug!(content_type, url = %req.url, "stream response is not text/event-stream");
        }

        sse::drive(response.body_mut().as_reader(), on_event)
    }

    fn download(&self, url: &str) -> Result<Download, ApiError> {
        debug!(url, "downloading");
        let mut response = self.agent.get(url).call()?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = if response.status().is_success() {
            response.body_mut().read_to_vec()?
        } else {
            Vec::new()
        };
        Ok(Download {
            status,
            content_type,
            bytes,
        })
    }
}

fn into_http_response(mut response: Response<Body>) -> Result<HttpResponse, ApiError> {
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    // Bodies are decoded lossily so an error status is never masked by
    // an undecodable body.
    let body = match response.body_mut().read_to_vec() {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) if !response.status().is_success() => {
            warn!(status, error = %err, "failed to read error response body");
            String::new()
        }
        Err(err) => {
            return Err(ApiError::Server {
                status: Some(status),
                message: format!("failed to read response body: {err}"),
            })
        }
    };
    Ok(HttpResponse { status, headers, body })
}
