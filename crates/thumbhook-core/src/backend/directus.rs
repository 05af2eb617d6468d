//! Directus REST backend.
//!
//! Talks to a Directus instance over HTTP:
//! - `GET /fields/{collection}` for the schema snapshot
//! - `GET /assets/{key}` (with transformation query parameters) for bytes
//! - `PATCH /files/{key}` or `PATCH /items/{collection}/{key}` for writes
//!
//! A static admin token stands in for the elevated system context.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;

use crate::config::DirectusConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::host::{AssetSource, AssetStream, RecordStore, SchemaSource};
use crate::types::{Accountability, RecordPatch, SchemaSnapshot, TransformationParams};

/// Collection whose records are served under `/files` instead of `/items`.
const FILES_COLLECTION: &str = "directus_files";

/// HTTP client for one Directus instance.
pub struct DirectusClient {
    base_url: String,
    token: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

/// `GET /fields/{collection}` response body.
#[derive(Deserialize)]
struct FieldsResponse {
    data: Vec<FieldEntry>,
}

#[derive(Deserialize)]
struct FieldEntry {
    field: String,
}

impl DirectusClient {
    pub fn new(config: &DirectusConfig) -> Self {
        let token = config.resolved_token();
        if token.is_none() {
            tracing::warn!("No Directus token configured; requests will be anonymous");
        }
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            token,
            timeout: Duration::from_millis(config.timeout_ms),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn fields_url(&self, collection: &str) -> String {
        format!("{}/fields/{}", self.base_url, collection)
    }

    fn asset_url(&self, key: &str) -> String {
        format!("{}/assets/{}", self.base_url, key)
    }

    fn record_url(&self, collection: &str, key: &str) -> String {
        if collection == FILES_COLLECTION {
            format!("{}/files/{}", self.base_url, key)
        } else {
            format!("{}/items/{}/{}", self.base_url, collection, key)
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Build a snapshot for `collection` from a `/fields` response body.
fn parse_fields(collection: &str, body: &str) -> Result<SchemaSnapshot, serde_json::Error> {
    let response: FieldsResponse = serde_json::from_str(body)?;
    Ok(response
        .data
        .into_iter()
        .fold(SchemaSnapshot::default().with_collection(collection), |schema, entry| {
            schema.with_field(collection, &entry.field)
        }))
}

#[async_trait]
impl SchemaSource for DirectusClient {
    async fn snapshot(&self, collection: &str) -> PipelineResult<Option<SchemaSnapshot>> {
        let schema_error = |message: String| PipelineError::Schema {
            collection: collection.to_string(),
            message,
        };

        let resp = self
            .authorized(self.client.get(self.fields_url(collection)))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| schema_error(format!("Directus request failed: {e}")))?;

        let status = resp.status();
        // Directus answers 403 for collections the token cannot see
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::FORBIDDEN {
            tracing::debug!(collection, %status, "Collection not visible");
            return Ok(Some(SchemaSnapshot::default()));
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(schema_error(format!("Directus HTTP {status}: {text}")));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| schema_error(format!("Failed to read fields response: {e}")))?;
        let schema = parse_fields(collection, &body)
            .map_err(|e| schema_error(format!("Failed to parse fields response: {e}")))?;
        Ok(Some(schema))
    }
}

#[async_trait]
impl AssetSource for DirectusClient {
    fn name(&self) -> &str {
        "directus"
    }

    fn supports_transforms(&self) -> bool {
        true
    }

    async fn get_asset(
        &self,
        key: &str,
        transform: Option<&TransformationParams>,
        accountability: &Accountability,
    ) -> PipelineResult<AssetStream> {
        let mut request = self.client.get(self.asset_url(key));
        if let Some(params) = transform {
            request = request.query(&params.query_pairs());
        }
        tracing::trace!(key, ?accountability, "Requesting Directus asset");

        let resp = self
            .authorized(request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| PipelineError::Fetch {
                key: key.to_string(),
                message: format!("Directus request failed: {e}"),
                status_code: None,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Fetch {
                key: key.to_string(),
                message: format!("Directus HTTP {status}: {text}"),
                status_code: Some(status.as_u16()),
            });
        }

        let stream_key = key.to_string();
        let body = resp
            .bytes_stream()
            .map(move |chunk| {
                chunk.map(|bytes| bytes.to_vec()).map_err(|e| PipelineError::Fetch {
                    key: stream_key.clone(),
                    message: format!("Asset stream interrupted: {e}"),
                    status_code: None,
                })
            })
            .boxed();

        Ok(AssetStream::new(key, body))
    }
}

#[async_trait]
impl RecordStore for DirectusClient {
    async fn update_one(
        &self,
        collection: &str,
        key: &str,
        patch: &RecordPatch,
        accountability: &Accountability,
    ) -> PipelineResult<()> {
        if !accountability.is_elevated() {
            tracing::debug!(key, "Record update without elevated context");
        }

        let resp = self
            .authorized(self.client.patch(self.record_url(collection, key)))
            .json(&patch.to_json())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| PipelineError::Persist {
                key: key.to_string(),
                message: format!("Directus request failed: {e}"),
                status_code: None,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Persist {
                key: key.to_string(),
                message: format!("Directus HTTP {status}: {text}"),
                status_code: Some(status.as_u16()),
            });
        }
        Ok(())
    }
}
