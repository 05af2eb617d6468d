//! Persist the encoded hash onto the originating record.

use crate::config::SchemaConfig;
use crate::error::PipelineResult;
use crate::host::RecordStore;
use crate::types::{Accountability, PerceptualHash, RecordPatch};

/// Writes hashes as base64 text under the elevated system context.
///
/// The hash is derived data, so the triggering user's field permissions are
/// not consulted.
pub struct Writeback {
    collection: String,
    field: String,
}

impl Writeback {
    pub fn new(schema: &SchemaConfig) -> Self {
        Self {
            collection: schema.collection.clone(),
            field: schema.field.clone(),
        }
    }

    /// Overwrite the hash field on `key`. Returns the stored text.
    pub async fn write(
        &self,
        store: &dyn RecordStore,
        key: &str,
        hash: &PerceptualHash,
    ) -> PipelineResult<String> {
        let encoded = hash.to_base64();
        let patch = RecordPatch {
            field: self.field.clone(),
            value: encoded.clone(),
        };

        store
            .update_one(&self.collection, key, &patch, &Accountability::System)
            .await?;

        tracing::info!(key, "Thumbhash was successfully created");
        Ok(encoded)
    }
}
