//! The `thumbhook config` command: inspect, check and create config files.

use std::fmt::Write as _;
use std::path::Path;

use clap::{Args, Subcommand};
use thumbhook_core::Config;

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective settings and the TOML they come from
    Show,

    /// Show config file path
    Path,

    /// Validate a config file without running anything
    Check {
        /// File to check (defaults to the standard location)
        file: Option<String>,
    },

    /// Write a config file with defaults
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,

        /// Directus base URL to write instead of the default
        #[arg(long)]
        url: Option<String>,

        /// Collection holding the hash field
        #[arg(long)]
        collection: Option<String>,

        /// Field the base64 hash is written to
        #[arg(long)]
        field: Option<String>,
    },
}

/// Execute the config command.
pub async fn execute(args: ConfigArgs) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let path = Config::default_path();
            let config = Config::load()?;
            print!("{}", summary(&config, &path));
            println!();
            println!("{}", config.to_toml()?);
        }

        ConfigCommand::Path => {
            println!("{}", Config::default_path().display());
        }

        ConfigCommand::Check { file } => {
            let path = file
                .as_deref()
                .map(super::expand_path)
                .unwrap_or_else(Config::default_path);
            let config = Config::load_from(&path)
                .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?;
            print!("{}", summary(&config, &path));
        }

        ConfigCommand::Init {
            force,
            url,
            collection,
            field,
        } => {
            let mut config = Config::default();
            if let Some(url) = url {
                config.directus.url = url;
            }
            if let Some(collection) = collection {
                config.schema.collection = collection;
            }
            if let Some(field) = field {
                config.schema.field = field;
            }

            let path = Config::default_path();
            write_config(&path, &config, force)?;
            tracing::info!("Config file created at: {}", path.display());
            println!("Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

/// Human-readable digest of the settings that decide where hashes go.
///
/// The token itself is never printed, only whether one resolves.
fn summary(config: &Config, path: &Path) -> String {
    let token = match (config.directus.resolved_token(), config.directus.token.contains("${")) {
        (Some(_), true) => format!("set (from {})", config.directus.token),
        (Some(_), false) => "set".to_string(),
        (None, true) => format!("missing ({} is unset)", config.directus.token),
        (None, false) => "none".to_string(),
    };

    let mut out = String::new();
    let _ = writeln!(out, "# config:   {}", path.display());
    let _ = writeln!(out, "# directus: {} (token {token})", config.directus.url);
    let _ = writeln!(
        out,
        "# target:   {}.{}",
        config.schema.collection, config.schema.field
    );
    let _ = writeln!(
        out,
        "# bounds:   {}x{} ({}), strategy {:?}, format {}",
        config.bounds.max_width,
        config.bounds.max_height,
        config.bounds.filter,
        config.transform.strategy,
        config.transform.format
    );
    if matches!(config.transform.format.as_str(), "jpg" | "jpeg") {
        let _ = writeln!(
            out,
            "# warning:  jpg transforms drop alpha; transparent uploads hash as opaque"
        );
    }
    out
}

/// Validate `config`, write it to `path` and read it back.
fn write_config(path: &Path, config: &Config, force: bool) -> anyhow::Result<Config> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
    }
    config.validate()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, config.to_toml()?)?;

    Ok(Config::load_from(path)?)
}
