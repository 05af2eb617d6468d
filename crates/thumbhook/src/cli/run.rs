//! The `thumbhook run` command: process upload events against Directus.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use clap::Args;
use serde::Serialize;
use thumbhook_core::{Config, PipelineFailure, PipelineState, RunResult, Thumbhook, UploadEvent};

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// File of upload events, as a JSON array or one JSON object per line
    /// (reads stdin when omitted or `-`)
    pub events: Option<String>,

    /// Directus base URL (overrides config)
    #[arg(long, env = "DIRECTUS_URL")]
    pub url: Option<String>,

    /// Number of events processed concurrently (overrides config)
    #[arg(short, long)]
    pub parallel: Option<usize>,
}

/// Output line for an event that failed.
#[derive(Debug, Serialize)]
struct FailureLine<'a> {
    status: &'static str,
    key: &'a str,
    reached: PipelineState,
    error: String,
}

impl<'a> FailureLine<'a> {
    fn new(failure: &'a PipelineFailure) -> Self {
        Self {
            status: "failed",
            key: &failure.key,
            reached: failure.reached,
            error: failure.source.to_string(),
        }
    }
}

/// Execute the run command.
pub async fn execute(args: RunArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(url) = args.url {
        config.directus.url = url;
    }
    if let Some(parallel) = args.parallel {
        config.processing.parallel_workers = parallel;
    }
    config.validate()?;

    let text = read_input(args.events.as_deref())?;
    let events = parse_events(&text)?;
    if events.is_empty() {
        tracing::warn!("No upload events to process");
        return Ok(());
    }

    tracing::info!(
        "Processing {} events against {} ({} workers)",
        events.len(),
        config.directus.url,
        config.processing.parallel_workers
    );

    let start = std::time::Instant::now();
    let thumbhook = Thumbhook::directus(config);
    let unreported = Arc::new(AtomicUsize::new(0));
    let unreported_in_callback = unreported.clone();
    let summary = thumbhook
        .handle_batch(events, move |result| {
            match result {
                Ok(outcome) => tracing::debug!(
                    key = outcome.key(),
                    state = %outcome.state(),
                    "Event finished"
                ),
                Err(failure) => tracing::error!("{failure}"),
            }
            if let Err(e) = emit_result(&mut std::io::stdout().lock(), result) {
                tracing::error!("Failed to write result: {e}");
                unreported_in_callback.fetch_add(1, Ordering::Relaxed);
            }
        })
        .await;

    tracing::info!(
        "Finished in {:?}: {} written, {} skipped, {} failed",
        start.elapsed(),
        summary.written,
        summary.skipped,
        summary.failed
    );

    let unreported = unreported.load(Ordering::Relaxed);
    if unreported > 0 {
        anyhow::bail!("{unreported} results could not be written to stdout");
    }
    if summary.failed > 0 {
        let total = summary.written + summary.skipped + summary.failed;
        anyhow::bail!("{} of {} events failed", summary.failed, total);
    }
    Ok(())
}

/// Read the event source, treating a missing path or `-` as stdin.
fn read_input(path: Option<&str>) -> anyhow::Result<String> {
    match path {
        None | Some("-") => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
        Some(raw) => {
            let path = super::expand_path(raw);
            std::fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))
        }
    }
}

/// Parse a JSON array of events, or one event per non-empty line.
fn parse_events(text: &str) -> anyhow::Result<Vec<UploadEvent>> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        let events: Vec<UploadEvent> = serde_json::from_str(trimmed)?;
        return Ok(events);
    }

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            UploadEvent::from_json(line).map_err(|e| anyhow::anyhow!("Line {}: {e}", idx + 1))
        })
        .collect()
}

fn result_line(result: &RunResult) -> serde_json::Result<String> {
    match result {
        Ok(outcome) => serde_json::to_string(outcome),
        Err(failure) => serde_json::to_string(&FailureLine::new(failure)),
    }
}

/// Write one result as a JSON line and flush it.
fn emit_result<W: Write>(out: &mut W, result: &RunResult) -> std::io::Result<()> {
    let line = result_line(result)?;
    writeln!(out, "{line}")?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use thumbhook_core::{PipelineError, PipelineOutcome, SkipReason};

    #[test]
    fn test_parse_json_array() {
        let events =
            parse_events(r#" [{"key":"a"},{"key":"b","payload":{"width":10,"height":20}}]"#)
                .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].payload.width, Some(10));
    }

    #[test]
    fn test_parse_json_lines_skips_blank() {
        let events = parse_events("{\"key\":\"a\"}\n\n{\"key\":\"b\"}\n").unwrap();
        assert_eq!(
            events.iter().map(|e| e.key.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_parse_reports_line_number() {
        let err = parse_events("{\"key\":\"a\"}\nnot json\n").unwrap_err();
        assert!(err.to_string().starts_with("Line 2"));
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(parse_events("").unwrap().is_empty());
    }

    #[test]
    fn test_read_input_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        std::fs::write(&path, "{\"key\":\"a\"}\n").unwrap();
        let text = read_input(path.to_str()).unwrap();
        assert_eq!(parse_events(&text).unwrap().len(), 1);
    }

    #[test]
    fn test_result_lines() {
        let skipped: RunResult = Ok(PipelineOutcome::Skipped {
            key: "a".to_string(),
            reason: SkipReason::FieldMissing,
        });
        let line: serde_json::Value =
            serde_json::from_str(&result_line(&skipped).unwrap()).unwrap();
        assert_eq!(line["status"], "skipped");
        assert_eq!(line["reason"], "field_missing");

        let failed: RunResult = Err(PipelineFailure {
            key: "b".to_string(),
            reached: PipelineState::Fetched,
            source: PipelineError::Decode {
                key: "b".to_string(),
                message: "bad header".to_string(),
            },
        });
        let line: serde_json::Value =
            serde_json::from_str(&result_line(&failed).unwrap()).unwrap();
        assert_eq!(line["status"], "failed");
        assert_eq!(line["key"], "b");
        assert_eq!(line["reached"], "fetched");
        assert!(line["error"].as_str().unwrap().contains("bad header"));
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_emit_result_writes_one_line() {
        let result: RunResult = Ok(PipelineOutcome::Written {
            key: "a".to_string(),
            hash: "AQID".to_string(),
            width: 100,
            height: 50,
        });
        let mut out = Vec::new();
        emit_result(&mut out, &result).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("\"status\":\"written\""));
    }

    #[test]
    fn test_emit_result_reports_broken_pipe() {
        let result: RunResult = Ok(PipelineOutcome::Skipped {
            key: "a".to_string(),
            reason: SkipReason::SchemaMissing,
        });
        let err = emit_result(&mut ClosedPipe, &result).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    }
}
