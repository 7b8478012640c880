//! Task calls for the vision API.
//!
//! # Design
//! `MoondreamClient` owns a `Config` and a `Transport`. Each task
//! normalizes the image reference, serializes its payload, makes exactly one
//! transport call and maps the raw JSON into a typed result. The transport
//! is a type parameter so tests can inject an in-memory double.

use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::error::ApiError;
use crate::image;
use crate::sse::DecodedEvent;
use crate::transport::{HttpTransport, Transport};
use crate::types::{
    Answer, Caption, CaptionLength, CaptionRequest, Detection, ObjectRequest, Pointing, QueryRequest,
};

#[derive(Debug, Clone)]
pub struct MoondreamClient<T = HttpTransport> {
    config: Config,
    transport: T,
}

impl MoondreamClient<HttpTransport> {
    pub fn new(config: Config) -> Self {
        let transport = HttpTransport::new(config.clone());
        Self { config, transport }
    }

    /// Client configured from `MOONDREAM_*` environment variables.
    pub fn from_env() -> Result<Self, ApiError> {
        Ok(Self::new(Config::from_env()?))
    }
}

impl<T: Transport> MoondreamClient<T> {
    pub fn with_transport(config: Config, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// POST /caption
    pub fn caption(&self, image: &str, length: CaptionLength) -> Result<Caption, ApiError> {
        let image_url = image::to_data_url(image, &self.transport)?;
        let payload = CaptionRequest {
            image_url: &image_url,
            length,
            stream: false,
        };
        self.call("/caption", &payload)
    }

    /// Streaming POST /caption. Each non-empty text chunk is handed to
    /// `on_chunk` as it arrives; the returned `Caption` carries the final
    /// caption the server reported, if any.
    pub fn caption_stream<F>(&self, image: &str, length: CaptionLength, mut on_chunk: F) -> Result<Caption, ApiError>
    where
        F: FnMut(&str),
    {
        let image_url = image::to_data_url(image, &self.transport)?;
        let payload = serde_json::to_value(CaptionRequest {
            image_url: &image_url,
            length,
            stream: true,
        })?;

        let mut result = Caption::default();
        self.transport.execute("/caption", &payload, &[], &mut |event: DecodedEvent| {
            if let Some(chunk) = event.data.get("chunk").and_then(Value::as_str) {
                if !chunk.is_empty() {
                    on_chunk(chunk);
                }
            }
            if let Some(caption) = event.data.get("caption").and_then(Value::as_str) {
                result.caption = Some(caption.to_string());
            }
            if let Some(id) = event.data.get("request_id").and_then(Value::as_str) {
                result.request_id = Some(id.to_string());
            }
        })?;
        Ok(result)
    }

    /// POST /detect
    pub fn detect(&self, image: &str, object: &str) -> Result<Detection, ApiError> {
        let image_url = image::to_data_url(image, &self.transport)?;
        self.call("/detect", &ObjectRequest {
            image_url: &image_url,
            object,
        })
    }

    /// POST /point
    pub fn point(&self, image: &str, object: &str) -> Result<Pointing, ApiError> {
        let image_url = image::to_data_url(image, &self.transport)?;
        self.call("/point", &ObjectRequest {
            image_url: &image_url,
            object,
        })
    }

    /// POST /query
    pub fn query(&self, image: &str, question: &str) -> Result<Answer, ApiError> {
        let image_url = image::to_data_url(image, &self.transport)?;
        self.call("/query", &QueryRequest {
            image_url: &image_url,
            question,
        })
    }

    fn call<P, R>(&self, path: &str, payload: &P) -> Result<R, ApiError>
    where
        P: Serialize,
        R: serde::de::DeserializeOwned,
    {
        let payload = serde_json::to_value(payload)?;
        let raw = self.transport.post(path, &payload, &[])?;
        Ok(serde_json::from_value(raw)?)
    }
}
