//! Capability check: does the target record type have a hash field?

use serde::Serialize;

use crate::config::SchemaConfig;
use crate::types::SchemaSnapshot;

/// Why a run was skipped without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The host supplied no schema for this event
    SchemaMissing,
    /// The collection does not declare the hash field (migration pending)
    FieldMissing,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::SchemaMissing => write!(f, "schema not found"),
            SkipReason::FieldMissing => write!(f, "hash field not declared"),
        }
    }
}

/// Result of the capability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Supported,
    Unsupported(SkipReason),
}

/// Decides per event whether the hash can be stored.
pub struct CapabilityGate {
    collection: String,
    field: String,
}

impl CapabilityGate {
    pub fn new(schema: &SchemaConfig) -> Self {
        Self {
            collection: schema.collection.clone(),
            field: schema.field.clone(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Check the event's schema. Missing capability is a warning, not an error.
    pub fn check(&self, schema: Option<&SchemaSnapshot>) -> Capability {
        let Some(schema) = schema else {
            tracing::warn!("Schema not found");
            return Capability::Unsupported(SkipReason::SchemaMissing);
        };

        if !schema.has_field(&self.collection, &self.field) {
            tracing::warn!(
                "Missing {} field on {}; run the migration that adds it",
                self.field,
                self.collection
            );
            return Capability::Unsupported(SkipReason::FieldMissing);
        }

        Capability::Supported
    }
}
