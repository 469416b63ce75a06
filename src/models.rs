//! Core data models for the versioned file store and context graph.
//!
//! These types mirror the SQLite rows (`files`, `versions`, `edges`) and the
//! result shapes returned to the CLI and HTTP adapter.

use serde::Serialize;

use crate::error::VaultError;

/// A logical file: the caller-visible identifier plus its current-version
/// pointer. Content lives in immutable version blobs, never in this record.
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub path: String,
    pub created_at: i64,
    pub content_type: String,
    pub current_version: i64,
    pub is_deleted: bool,
}

/// Immutable snapshot of a logical file's content. Sequence numbers start at
/// 1 and are unique per path; rows are append-only and never renumbered.
#[derive(Debug, Clone, Serialize)]
pub struct VersionMeta {
    pub path: String,
    pub seq: i64,
    pub digest: String,
    pub size: i64,
    pub created_at: i64,
    pub created_by: String,
}

/// Directed relationship between two logical files. Edges relate logical
/// files, not version snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct EdgeRecord {
    pub id: String,
    pub source: String,
    pub target: String,
    pub kind: String,
    pub created_at: i64,
}

/// Traversal direction for neighbor queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

impl std::str::FromStr for Direction {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "outgoing" => Ok(Direction::Outgoing),
            "incoming" => Ok(Direction::Incoming),
            "both" => Ok(Direction::Both),
            other => Err(VaultError::InvalidEdge(format!(
                "unknown direction '{}' (expected outgoing, incoming, or both)",
                other
            ))),
        }
    }
}

/// One neighboring file as seen from a neighbor query.
#[derive(Debug, Clone, Serialize)]
pub struct NeighborRef {
    pub path: String,
    pub kind: String,
    pub edge_id: String,
}

/// Per-item result of a batch upload. A failure on one item never rolls back
/// the others.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItemResult {
    pub path: String,
    #[serde(flatten)]
    pub outcome: BatchOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    Uploaded { version: VersionMeta },
    Conflict,
    Failed { error: String },
}

impl BatchOutcome {
    /// Collapses one item's upload result into its batch outcome.
    pub fn from_upload(result: Result<VersionMeta, VaultError>) -> Self {
        match result {
            Ok(version) => BatchOutcome::Uploaded { version },
            Err(VaultError::Conflict(_)) => BatchOutcome::Conflict,
            Err(e) => BatchOutcome::Failed {
                error: e.to_string(),
            },
        }
    }
}

/// Aggregate statistics over live files.
#[derive(Debug, Clone, Serialize)]
pub struct VaultStats {
    pub total_files: i64,
    pub total_versions: i64,
    pub total_size: i64,
    pub total_edges: i64,
    pub by_extension: std::collections::BTreeMap<String, i64>,
    pub storage_root: String,
}
