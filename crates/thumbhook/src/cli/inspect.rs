//! The `thumbhook inspect` command: decode a stored hash.

use clap::Args;
use thumbhook_core::{HashEncoder, PerceptualHash};

/// Arguments for the `inspect` command.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Base64 thumbhash as stored on a record
    #[arg(required = true)]
    pub hash: String,
}

/// Execute the inspect command.
pub fn execute(args: InspectArgs) -> anyhow::Result<()> {
    let hash = PerceptualHash::from_base64(args.hash.trim())
        .map_err(|e| anyhow::anyhow!("Invalid base64: {e}"))?;
    let summary = HashEncoder::inspect(&hash)?;

    let report = serde_json::json!({
        "bytes": hash.len(),
        "average_rgba": summary.average_rgba,
        "aspect_ratio": summary.aspect_ratio,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
