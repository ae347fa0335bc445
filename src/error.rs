//! Error types for Canopy
//!
//! All modules use `CanopyResult<T>` as their return type. A negative
//! lookup (id absent from a tree) is not an error and is modeled as
//! `Ok(None)` by the query path.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Canopy operations
pub type CanopyResult<T> = Result<T, CanopyError>;

/// All errors that can occur in Canopy
#[derive(Error, Debug)]
pub enum CanopyError {
    // Source errors
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Source file unavailable: {0}")]
    SourceUnavailable(PathBuf),

    #[error("Malformed row in {path} at line {line}: {reason}")]
    Decode {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Rows out of order in {path} at line {line}: id {id} follows {prev}")]
    Unordered {
        path: PathBuf,
        line: usize,
        id: u64,
        prev: u64,
    },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Invalid listen address {addr}: {reason}")]
    ListenAddrInvalid { addr: String, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl CanopyError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a decode error for a malformed header or row
    pub fn decode(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    /// Whether the error aborts a single build pass but leaves the
    /// source retryable on a later request
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable(_) | Self::Decode { .. } | Self::Io { .. }
        )
    }
}
