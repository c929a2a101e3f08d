//! Subscriber setup for applications embedding doc-composer.
//!
//! The library only emits `tracing` events under the `doc_composer` target:
//! `planned query`, `query plan executed` and `mutation finished` at debug,
//! plus a warning for every document that vanished during a mutation.
//! Installing a subscriber is left to the caller; these helpers cover the
//! common cases.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::Subscriber;
use tracing_subscriber::EnvFilter;

use crate::error::{ComposeError, Result};

/// Filter applied when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "doc_composer=info";

/// Reads `RUST_LOG`, falling back to [`DEFAULT_DIRECTIVE`].
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Builds a subscriber that appends plain-text events to `log_path`,
/// creating its directory if needed.
pub fn file_subscriber(
    log_path: &Path,
    filter: EnvFilter,
) -> Result<impl Subscriber + Send + Sync + 'static> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            ComposeError::config(format!(
                "cannot create log directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .map_err(|e| {
            ComposeError::config(format!("cannot open log file {}: {e}", log_path.display()))
        })?;

    Ok(tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .finish())
}

/// Installs a global subscriber writing to stderr.
///
/// Fails if a global subscriber is already set.
pub fn init_stderr_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| ComposeError::config(format!("cannot install logger: {e}")))
}

/// Installs a global subscriber appending to `log_path`.
pub fn init_file_logging(log_path: &Path) -> Result<()> {
    let subscriber = file_subscriber(log_path, env_filter())?;
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ComposeError::config(format!("cannot install logger: {e}")))
}

/// Returns the default path for the log file.
///
/// Uses the platform state directory (`~/.local/state/doc-composer/` on
/// Linux), then the config directory, then the temp directory.
pub fn default_log_path() -> PathBuf {
    if let Some(state_dir) = dirs::state_dir() {
        return state_dir.join("doc-composer").join("doc-composer.log");
    }

    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("doc-composer").join("doc-composer.log");
    }

    std::env::temp_dir().join("doc-composer.log")
}
