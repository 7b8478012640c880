//! Image reference normalization.
//!
//! The API expects `image_url` to be a `data:` URL. Remote `http(s)` images
//! are downloaded through the client's transport and inlined as base64;
//! anything else is passed through.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::ApiError;
use crate::transport::Transport;

const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

pub fn is_data_url(reference: &str) -> bool {
    reference.starts_with("data:")
}

pub fn is_http_url(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

/// Resolve `reference` into something the API accepts as `image_url`.
pub fn to_data_url<T: Transport + ?Sized>(reference: &str, transport: &T) -> Result<String, ApiError> {
    if is_data_url(reference) || !is_http_url(reference) {
        return Ok(reference.to_string());
    }
    let download = transport.download(reference)?;
    if !download.is_success() {
        return Err(ApiError::Server {
            status: Some(download.status),
            message: format!("Failed to download image: {}", download.status),
        });
    }
    Ok(encode_data_url(download.content_type.as_deref(), &download.bytes))
}

/// `data:<content-type>;base64,<bytes>`, defaulting to `image/jpeg`.
pub fn encode_data_url(content_type: Option<&str>, bytes: &[u8]) -> String {
    let content_type = content_type.filter(|ct| !ct.is_empty()).unwrap_or(DEFAULT_CONTENT_TYPE);
    format!("data:{content_type};base64,{}", STANDARD.encode(bytes))
}
