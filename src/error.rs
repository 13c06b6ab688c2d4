use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by a [`ReleaseSource`](crate::update::ReleaseSource)
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to decode release metadata: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors returned from the check, apply and cleanup entry points.
///
/// None of these leave the running application in a different state than
/// before the call, so the host is free to log them and carry on.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// A required request field is empty
    #[error("Invalid update request: {field} is required")]
    Configuration { field: &'static str },

    #[error("Failed to fetch latest release: {0}")]
    ReleaseFetch(#[source] SourceError),

    #[error("Failed to download update: {0}")]
    Download(#[source] SourceError),

    #[error("No release asset named '{expected}' (available: {})", .candidates.join(", "))]
    AssetNotFound {
        expected: String,
        candidates: Vec<String>,
    },

    #[error("Failed to stage update at {path}: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No prepared update found at {path}")]
    NothingPrepared { path: PathBuf },

    #[error("Failed to start update process {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to clean up staged update {path}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors inside a replacement child. These end the process, see
/// [`handle_replacement_mode`](crate::update::handle_replacement_mode).
#[derive(Error, Debug)]
pub enum ReplacementError {
    #[error("Invalid update mode arguments: {reason}")]
    MalformedHandoff { reason: String },

    #[error("Timed out after {timeout:?} waiting for process {pid} to exit")]
    ParentTimeout { pid: u32, timeout: Duration },

    #[error("Failed to get current executable path: {0}")]
    CurrentExe(#[source] io::Error),

    #[error("Failed to replace {to} with {from}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}
