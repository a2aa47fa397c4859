//! Error types shared across EasyCut crates.

use std::path::PathBuf;

/// Top-level error type for EasyCut operations.
#[derive(Debug, thiserror::Error)]
pub enum EasycutError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Work item list is empty")]
    EmptyInput,

    #[error("Job failed: {message}")]
    Job { message: String },

    #[error("Render cancelled")]
    Cancelled,

    #[error("Stream error: {message}")]
    Stream { message: String },

    #[error("Precondition violated: {message}")]
    Precondition { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using EasycutError.
pub type EasycutResult<T> = Result<T, EasycutError>;

/// Coarse classification of an [`EasycutError`].
///
/// Configuration errors are raised before any encoder job starts; job
/// errors terminate the whole render session; stream errors stay local to
/// one preview request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    JobExecution,
    Stream,
    PreconditionViolation,
    Io,
    Other,
}

impl EasycutError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn job(msg: impl Into<String>) -> Self {
        Self::Job {
            message: msg.into(),
        }
    }

    pub fn stream(msg: impl Into<String>) -> Self {
        Self::Stream {
            message: msg.into(),
        }
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } | Self::EmptyInput | Self::Unsupported { .. } => {
                ErrorKind::Configuration
            }
            Self::Job { .. } | Self::Cancelled | Self::FileNotFound { .. } => {
                ErrorKind::JobExecution
            }
            Self::Stream { .. } => ErrorKind::Stream,
            Self::Precondition { .. } => ErrorKind::PreconditionViolation,
            Self::Io(_) => ErrorKind::Io,
            Self::Json(_) | Self::Other(_) => ErrorKind::Other,
        }
    }
}
