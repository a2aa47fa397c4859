//! Errors raised while building or loading render data.

use std::path::PathBuf;

/// Errors that can occur when working with schemes, work items, and
/// session files.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Invalid frame size '{value}' (expected WIDTHxHEIGHT)")]
    InvalidSize { value: String },

    #[error("Invalid scheme: {message}")]
    InvalidScheme { message: String },

    #[error("Invalid filter: {message}")]
    InvalidFilter { message: String },

    #[error("Work item index {index} out of range (registry has {len} items)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
}
