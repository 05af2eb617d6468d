//! Pipeline orchestration - wires the stages together for one upload event.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Semaphore;

use crate::config::{Config, LimitsConfig};
use crate::error::{PipelineFailure, PipelineResult};
use crate::host::{AssetSource, RecordStore, SchemaSource};
use crate::types::UploadEvent;

use super::encode::HashEncoder;
use super::fetch::AssetFetcher;
use super::gate::{Capability, CapabilityGate, SkipReason};
use super::normalize::PixelNormalizer;
use super::state::{PipelineRun, PipelineState};
use super::writeback::Writeback;

/// How a run that did not fail ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    /// Hash computed and stored on the record
    Written {
        key: String,
        hash: String,
        width: u32,
        height: u32,
    },
    /// Capability missing; nothing fetched or written
    Skipped { key: String, reason: SkipReason },
}

impl PipelineOutcome {
    pub fn key(&self) -> &str {
        match self {
            PipelineOutcome::Written { key, .. } | PipelineOutcome::Skipped { key, .. } => key,
        }
    }

    /// Terminal state this outcome corresponds to.
    pub fn state(&self) -> PipelineState {
        match self {
            PipelineOutcome::Written { .. } => PipelineState::Done,
            PipelineOutcome::Skipped { .. } => PipelineState::Aborted,
        }
    }
}

/// Result of one pipeline invocation.
pub type RunResult = Result<PipelineOutcome, PipelineFailure>;

/// Counts from a batch of dispatched events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl DispatchSummary {
    fn record(&mut self, result: &RunResult) {
        match result {
            Ok(PipelineOutcome::Written { .. }) => self.written += 1,
            Ok(PipelineOutcome::Skipped { .. }) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Runs Gate -> Fetch -> Normalize -> Encode -> Writeback per event.
///
/// Holds no per-event state; one coordinator can serve any number of
/// concurrent invocations.
pub struct PipelineCoordinator {
    gate: CapabilityGate,
    fetcher: AssetFetcher,
    normalizer: PixelNormalizer,
    writeback: Writeback,
    limits: LimitsConfig,
    parallel_workers: usize,
    schema_source: Arc<dyn SchemaSource>,
    assets: Arc<dyn AssetSource>,
    records: Arc<dyn RecordStore>,
}

impl PipelineCoordinator {
    /// Create a coordinator over the given host services.
    pub fn new(
        config: &Config,
        schema_source: Arc<dyn SchemaSource>,
        assets: Arc<dyn AssetSource>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            gate: CapabilityGate::new(&config.schema),
            fetcher: AssetFetcher::new(config.bounds.clone(), config.transform.clone()),
            normalizer: PixelNormalizer::new(config.bounds.clone(), config.limits.clone()),
            writeback: Writeback::new(&config.schema),
            limits: config.limits.clone(),
            parallel_workers: config.processing.parallel_workers.max(1),
            schema_source,
            assets,
            records,
        }
    }

    /// Process one upload event to completion.
    ///
    /// A missing capability is reported as `Ok(Skipped)`; every other
    /// problem is returned unchanged inside the failure, together with the
    /// last state reached. No retries are attempted.
    pub async fn run(&self, event: UploadEvent) -> RunResult {
        let start = Instant::now();
        let mut run = PipelineRun::new(event.key.clone());

        match self.execute(&event, &mut run).await {
            Ok(outcome) => {
                tracing::debug!(
                    "Pipeline for {} ended {} in {:?}",
                    event.key,
                    run.state(),
                    start.elapsed()
                );
                Ok(outcome)
            }
            Err(source) => {
                let reached = run.advance(PipelineState::Failed);
                tracing::debug!("Pipeline for {} failed after {}: {}", event.key, reached, source);
                Err(PipelineFailure {
                    key: event.key,
                    reached,
                    source,
                })
            }
        }
    }

    async fn execute(
        &self,
        event: &UploadEvent,
        run: &mut PipelineRun,
    ) -> PipelineResult<PipelineOutcome> {
        event.validate()?;
        let key = event.key.as_str();

        // Gate
        let schema = self.schema_source.snapshot(self.gate.collection()).await?;
        let capability = self.gate.check(schema.as_ref());
        run.advance(PipelineState::GateChecked);
        if let Capability::Unsupported(reason) = capability {
            run.advance(PipelineState::Aborted);
            return Ok(PipelineOutcome::Skipped {
                key: key.to_string(),
                reason,
            });
        }

        // Fetch
        let fetch_start = Instant::now();
        let stream = self.fetcher.fetch(self.assets.as_ref(), event).await?;
        let transformed = stream.transformed;
        let reported = stream.dimensions();
        let bytes = stream.collect(self.limits.max_asset_bytes()).await?;
        run.advance(PipelineState::Fetched);
        tracing::trace!(
            "  Fetch: {:?} ({} bytes, transformed: {})",
            fetch_start.elapsed(),
            bytes.len(),
            transformed
        );

        // Normalize
        let normalize_start = Instant::now();
        let buffer = self.normalizer.normalize(key, bytes, reported).await?;
        run.advance(PipelineState::Normalized);
        tracing::trace!(
            "  Normalize: {:?} ({}x{})",
            normalize_start.elapsed(),
            buffer.width(),
            buffer.height()
        );

        // Encode
        let encode_start = Instant::now();
        let hash = HashEncoder::encode_buffer(&buffer)?;
        run.advance(PipelineState::Encoded);
        tracing::trace!("  Encode: {:?} ({} bytes)", encode_start.elapsed(), hash.len());

        // Writeback
        let write_start = Instant::now();
        let stored = self.writeback.write(self.records.as_ref(), key, &hash).await?;
        run.advance(PipelineState::Written);
        tracing::trace!("  Writeback: {:?}", write_start.elapsed());

        run.advance(PipelineState::Done);
        Ok(PipelineOutcome::Written {
            key: key.to_string(),
            hash: stored,
            width: buffer.width(),
            height: buffer.height(),
        })
    }

    /// Run many events concurrently, bounded by `processing.parallel_workers`.
    ///
    /// Events for the same key are not serialized against each other; the
    /// last write wins. `on_result` is called as each invocation finishes.
    pub async fn dispatch<F>(
        self: &Arc<Self>,
        events: Vec<UploadEvent>,
        on_result: F,
    ) -> DispatchSummary
    where
        F: Fn(&RunResult) + Send + Sync + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.parallel_workers));
        let on_result = Arc::new(on_result);
        let mut handles = Vec::with_capacity(events.len());

        for event in events {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::warn!("Dispatch semaphore closed unexpectedly; stopping batch");
                    break;
                }
            };

            let coordinator = Arc::clone(self);
            let on_result = on_result.clone();
            handles.push(tokio::spawn(async move {
                let result = coordinator.run(event).await;
                drop(permit);
                on_result(&result);
                result
            }));
        }

        let mut summary = DispatchSummary::default();
        for handle in handles {
            match handle.await {
                Ok(result) => summary.record(&result),
                Err(e) => {
                    tracing::error!("Pipeline task panicked: {e}");
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}
