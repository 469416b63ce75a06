//! Typed error taxonomy for the vault core.
//!
//! Every core operation returns `Result<_, VaultError>`; nothing is swallowed.
//! The HTTP adapter and CLI map variants to status codes / exit messages via
//! [`VaultError::code`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    /// Malformed or escaping logical path. Always caller-fixable.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Unknown logical path, version, or edge.
    #[error("not found: {0}")]
    NotFound(String),

    /// The path already exists and overwrite was not requested.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Self-referencing, duplicate, or otherwise unacceptable edge.
    #[error("invalid edge: {0}")]
    InvalidEdge(String),

    /// Content exceeds the configured size limit.
    #[error("content too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },

    /// Blob bytes on disk no longer match the recorded digest.
    /// Surfaced on every read, never silently repaired.
    #[error("corrupted content: {path} v{seq} (expected digest {expected}, got {actual})")]
    CorruptedContent {
        path: String,
        seq: i64,
        expected: String,
        actual: String,
    },

    /// Underlying blob read/write failure. The caller decides on retry.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata store failure.
    #[error("metadata store error: {0}")]
    Db(#[from] sqlx::Error),
}

impl VaultError {
    /// Machine-readable error code used in the HTTP error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            VaultError::InvalidPath(_) => "invalid_path",
            VaultError::NotFound(_) => "not_found",
            VaultError::Conflict(_) => "conflict",
            VaultError::InvalidEdge(_) => "invalid_edge",
            VaultError::TooLarge { .. } => "too_large",
            VaultError::CorruptedContent { .. } => "corrupted_content",
            VaultError::Io(_) | VaultError::Db(_) => "storage_io",
        }
    }
}
