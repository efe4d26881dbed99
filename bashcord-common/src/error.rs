use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum BashcordError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP Request Error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("Permission denied for {}: {source}", path.display())]
    PermissionDenied {
        path: PathBuf,
        source: Arc<std::io::Error>,
    },

    #[error("Scuffed install detected at {}", .0.display())]
    ScuffedInstall(PathBuf),

    #[error("Nothing to restore: {0}")]
    NothingToRestore(String),

    #[error("Release feed unavailable: {0}")]
    FeedUnavailable(String),

    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("Failed to replace executable: {0}")]
    ReplaceFailed(String),

    #[error("Payload missing: {0}")]
    PayloadMissing(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("DownloadError: Failed to download '{0}' from '{1}': {2}")]
    DownloadError(String, String, String),

    #[error("HttpError: {0}")]
    HttpError(String),

    #[error("Validation Error: {0}")]
    ValidationError(String),

    #[error("IoError: {0}")]
    IoError(String),

    #[error("Generic Error: {0}")]
    Generic(String),
}

impl BashcordError {
    /// Wraps an I/O error that happened while touching `path`, keeping
    /// permission failures apart from every other I/O failure.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::PermissionDenied {
            BashcordError::PermissionDenied {
                path: path.to_path_buf(),
                source: Arc::new(err),
            }
        } else {
            BashcordError::Io(Arc::new(io::Error::new(
                err.kind(),
                format!("{}: {}", path.display(), err),
            )))
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        match self {
            BashcordError::PermissionDenied { .. } => true,
            BashcordError::Io(e) => e.kind() == io::ErrorKind::PermissionDenied,
            _ => false,
        }
    }

    /// Network and feed failures only disable update features.
    pub fn is_feed_error(&self) -> bool {
        matches!(
            self,
            BashcordError::FeedUnavailable(_)
                | BashcordError::Http(_)
                | BashcordError::HttpError(_)
                | BashcordError::DownloadError(..)
        )
    }
}

impl From<std::io::Error> for BashcordError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == io::ErrorKind::PermissionDenied {
            return BashcordError::PermissionDenied {
                path: PathBuf::new(),
                source: Arc::new(err),
            };
        }
        BashcordError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for BashcordError {
    fn from(err: reqwest::Error) -> Self {
        BashcordError::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for BashcordError {
    fn from(err: serde_json::Error) -> Self {
        BashcordError::Json(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, BashcordError>;
