//! Blocking client core for the Moondream vision API.
//!
//! # Overview
//! Callers submit an image reference plus a task (caption, detect, point,
//! query) and receive typed results. Captions can also be streamed as
//! Server-Sent Events and delivered chunk by chunk.
//!
//! # Design
//! - `http` describes requests and responses as plain data and owns the
//!   header policy and the status-to-error mapping.
//! - `Transport` is the network seam; `HttpTransport` implements it over a
//!   blocking `ureq` agent.
//! - `sse` reassembles events from arbitrarily chunked bytes. Its state is
//!   created per streaming call and never shared.
//! - `Config` is an explicit value; there is no process-wide client.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod image;
pub mod sse;
pub mod transport;
pub mod types;

pub use client::MoondreamClient;
pub use config::Config;
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use sse::{DecodedEvent, EventDecoder, EventStream, LineBuffer};
pub use transport::{Download, HttpTransport, Transport};
pub use types::{Answer, BoundingBox, Caption, CaptionLength, Coordinate, Detection, Pointing};
