//! Request payloads and task results for the vision API.
//!
//! # Design
//! Results are deserialized from the raw JSON map the transport returns.
//! Top-level fields the server leaves out become `None` or an empty list;
//! only a structurally broken box or point is treated as an error.

use serde::{Deserialize, Serialize};

/// How long a generated caption should be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionLength {
    Short,
    #[default]
    Normal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaptionRequest<'a> {
    pub image_url: &'a str,
    pub length: CaptionLength,
    pub stream: bool,
}

/// Payload shared by `/detect` and `/point`.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectRequest<'a> {
    pub image_url: &'a str,
    pub object: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest<'a> {
    pub image_url: &'a str,
    pub question: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Caption {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

/// Normalized bounding box; every coordinate is in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Detection {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub objects: Vec<BoundingBox>,
}

/// Normalized center point in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Pointing {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub points: Vec<Coordinate>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Answer {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
