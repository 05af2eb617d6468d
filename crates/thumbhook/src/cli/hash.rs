//! The `thumbhook hash` command: hash a local image file.

use clap::Args;
use serde::Serialize;
use thumbhook_core::pipeline::{HashEncoder, PixelNormalizer};
use thumbhook_core::Config;

/// Arguments for the `hash` command.
#[derive(Args, Debug)]
pub struct HashArgs {
    /// Image file to hash
    #[arg(required = true)]
    pub file: String,

    /// Override the configured maximum width (1-100)
    #[arg(long)]
    pub max_width: Option<u32>,

    /// Override the configured maximum height (1-100)
    #[arg(long)]
    pub max_height: Option<u32>,

    /// Print a JSON object with dimensions instead of the bare hash
    #[arg(long)]
    pub json: bool,
}

/// JSON output of `hash --json`.
#[derive(Debug, Serialize)]
struct HashReport {
    file: String,
    width: u32,
    height: u32,
    bytes: usize,
    hash: String,
}

/// Execute the hash command.
pub async fn execute(args: HashArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(width) = args.max_width {
        config.bounds.max_width = width;
    }
    if let Some(height) = args.max_height {
        config.bounds.max_height = height;
    }
    config.validate()?;

    let path = super::expand_path(&args.file);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;

    let normalizer = PixelNormalizer::new(config.bounds.clone(), config.limits.clone());
    let buffer = normalizer.normalize(&args.file, bytes, None).await?;
    let hash = HashEncoder::encode_buffer(&buffer)?;
    tracing::debug!(
        "Hashed {} at {}x{} into {} bytes",
        path.display(),
        buffer.width(),
        buffer.height(),
        hash.len()
    );

    if args.json {
        let report = HashReport {
            file: path.display().to_string(),
            width: buffer.width(),
            height: buffer.height(),
            bytes: hash.len(),
            hash: hash.to_base64(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", hash.to_base64());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(file: &str) -> HashArgs {
        HashArgs {
            file: file.to_string(),
            max_width: None,
            max_height: None,
            json: false,
        }
    }

    #[tokio::test]
    async fn test_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.png");
        let err = execute(args(path.to_str().unwrap()), Config::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[tokio::test]
    async fn test_out_of_range_bound_rejected() {
        let mut args = args("unused.png");
        args.max_width = Some(500);
        assert!(execute(args, Config::default()).await.is_err());
    }
}
