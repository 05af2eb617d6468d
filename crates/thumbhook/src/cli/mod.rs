//! Subcommand handlers.

pub mod config;
pub mod hash;
pub mod inspect;
pub mod run;

use std::path::PathBuf;

/// Expand `~` in a user-supplied path.
pub(crate) fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}
