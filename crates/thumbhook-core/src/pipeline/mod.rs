//! Placeholder pipeline stages.
//!
//! One upload event flows through these in order:
//! - **gate**: Check the target collection carries the hash field
//! - **fetch**: Request the asset, bounded server-side when possible
//! - **normalize**: Decode and clamp to at most 100x100 RGBA
//! - **encode**: Compute the ThumbHash
//! - **writeback**: Store the base64 hash on the record
//! - **coordinator**: Runs the stages and tracks state
//! - **state**: Lifecycle states and allowed transitions

pub mod coordinator;
pub mod encode;
pub mod fetch;
pub mod gate;
pub mod normalize;
pub mod state;
pub mod writeback;

// Re-exports for convenient access
pub use coordinator::{DispatchSummary, PipelineCoordinator, PipelineOutcome, RunResult};
pub use encode::{HashEncoder, HashSummary, MAX_HASH_LEN};
pub use fetch::AssetFetcher;
pub use gate::{Capability, CapabilityGate, SkipReason};
pub use normalize::{fit_within, PixelNormalizer};
pub use state::{PipelineRun, PipelineState};
pub use writeback::Writeback;
