//! Core data types for the upload-to-thumbhash pipeline.
//!
//! These cover the event delivered by the host, the schema snapshot used to
//! gate a run, and the transient pixel/hash artifacts produced along the way.

use std::collections::{BTreeSet, HashMap};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// An upload-completed event as delivered by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadEvent {
    /// Key of the uploaded file's record
    pub key: String,

    /// Upload metadata, when the host already knows it
    #[serde(default)]
    pub payload: UploadPayload,

    /// Permission context of whoever triggered the upload
    #[serde(default)]
    pub accountability: Accountability,
}

/// Dimensions reported with the upload, if known.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl UploadEvent {
    /// Build an event for `key` with no payload metadata.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            payload: UploadPayload::default(),
            accountability: Accountability::default(),
        }
    }

    /// Attach the reported dimensions.
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.payload = UploadPayload {
            width: Some(width),
            height: Some(height),
        };
        self
    }

    /// Parse and validate an event from JSON.
    pub fn from_json(json: &str) -> PipelineResult<Self> {
        let event: Self =
            serde_json::from_str(json).map_err(|e| PipelineError::InvalidEvent(e.to_string()))?;
        event.validate()?;
        Ok(event)
    }

    /// Check the event's shape before any side effects happen.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.key.trim().is_empty() {
            return Err(PipelineError::InvalidEvent("key must not be empty".into()));
        }
        if self.payload.width == Some(0) || self.payload.height == Some(0) {
            return Err(PipelineError::InvalidEvent(format!(
                "payload dimensions must be positive for {}",
                self.key
            )));
        }
        Ok(())
    }
}

/// Permission context attached to host calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Accountability {
    /// No authenticated user
    #[default]
    Anonymous,
    /// A regular user; field permissions apply
    User { id: String },
    /// Elevated system context that bypasses field permissions
    System,
}

impl Accountability {
    /// Whether writes under this context skip field-level permissions.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Accountability::System)
    }
}

/// Read-only view of the host schema for one event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub collections: HashMap<String, CollectionSchema>,
}

/// Fields declared on a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub fields: BTreeSet<String>,
}

impl SchemaSnapshot {
    /// Add `field` to `collection`, creating the collection if needed.
    pub fn with_field(mut self, collection: &str, field: &str) -> Self {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .fields
            .insert(field.to_string());
        self
    }

    /// Add an empty collection.
    pub fn with_collection(mut self, collection: &str) -> Self {
        self.collections.entry(collection.to_string()).or_default();
        self
    }

    pub fn has_field(&self, collection: &str, field: &str) -> bool {
        self.collections
            .get(collection)
            .is_some_and(|c| c.fields.contains(field))
    }
}

/// Parameters asking the asset service to resize before sending bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub fit: String,
    pub format: String,
    pub quality: u8,
    pub without_enlargement: bool,
}

impl TransformationParams {
    /// Query-string pairs in the asset service's naming.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(6);
        if let Some(width) = self.width {
            pairs.push(("width", width.to_string()));
        }
        if let Some(height) = self.height {
            pairs.push(("height", height.to_string()));
        }
        pairs.push(("fit", self.fit.clone()));
        pairs.push(("format", self.format.clone()));
        pairs.push(("quality", self.quality.to_string()));
        pairs.push(("withoutEnlargement", self.without_enlargement.to_string()));
        pairs
    }
}

/// Field update applied to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPatch {
    pub field: String,
    pub value: String,
}

impl RecordPatch {
    /// JSON body `{ "<field>": "<value>" }`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        body.insert(
            self.field.clone(),
            serde_json::Value::String(self.value.clone()),
        );
        serde_json::Value::Object(body)
    }
}

/// Raw RGBA8 pixels, row-major, no stride padding.
///
/// Construction checks `pixels.len() == width * height * 4` and non-zero
/// dimensions, so every buffer in circulation is well-formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> PipelineResult<Self> {
        if width == 0 || height == 0 {
            return Err(PipelineError::Encode(format!(
                "pixel buffer must be non-empty, got {width}x{height}"
            )));
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(PipelineError::Encode(format!(
                "RGBA length mismatch for {width}x{height}: expected {expected}, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// Compact ThumbHash bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PerceptualHash(Vec<u8>);

impl PerceptualHash {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Text form stored on the record.
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.0)
    }

    pub fn from_base64(text: &str) -> Result<Self, base64::DecodeError> {
        BASE64.decode(text.trim()).map(Self)
    }
}
