use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the whole engine.
/// Every module returns `CoreResult<T>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Instance ────────────────────────────────────────
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Instance already exists: {0}")]
    InstanceAlreadyExists(String),

    // ── Content ─────────────────────────────────────────
    #[error("Content {content_id} not found in instance {instance_id}")]
    ContentNotFound {
        instance_id: String,
        content_id: u64,
    },

    #[error("Cannot toggle content {content_id} in instance {instance_id}: {reason}")]
    ToggleConflict {
        instance_id: String,
        content_id: u64,
        reason: String,
    },

    #[error("Invalid request: {0}")]
    BadRequest(String),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type CoreResult<T> = Result<T, CoreError>;

impl From<std::io::Error> for CoreError {
    fn from(source: std::io::Error) -> Self {
        CoreError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl CoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoreError::Io {
            path: path.into(),
            source,
        }
    }
}
