//! Error types for quarry-index.

use crate::store::StorageError;

/// Errors that can occur while scanning, chunking, embedding or storing a workspace.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error reading source files or snapshots.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Embedding provider error.
    #[error("embedding error: {0}")]
    Embed(#[from] quarry_embed::EmbedError),

    /// Tree-sitter parsing error.
    #[error("parse failed: {0}")]
    Parse(String),

    /// Storage collaborator error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Contextualizer request failed.
    #[error("contextualizer error: {0}")]
    Contextualizer(String),

    /// Path outside the workspace or otherwise unusable.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Malformed include/exclude glob.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] globset::Error),

    /// Generic catch-all error.
    #[error("{0}")]
    Other(String),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
