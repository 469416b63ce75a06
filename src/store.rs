//! Version store: immutable content blobs plus append-only version records.
//!
//! Blobs are written to `<root>/blobs/<path>/v<seq>` via a temp file and an
//! atomic rename, *before* the metadata transaction commits. The metadata
//! store is the single source of truth for visibility: a blob with no
//! committed version row is invisible garbage, never the other way around.
//!
//! Mutating methods assume the caller serializes them per logical path (the
//! [`Vault`](crate::vault::Vault) holds the per-path lock table). Reads take
//! no lock; the single-transaction pointer update guarantees they observe
//! either pre- or post-commit state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};

use crate::error::VaultError;
use crate::models::{FileRecord, VersionMeta};
use crate::paths;

pub struct VersionStore {
    pool: SqlitePool,
    root: PathBuf,
    max_file_size: u64,
}

/// Lowercase hex SHA-256 of a content buffer.
pub fn digest_hex(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

fn now_micros() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

impl VersionStore {
    pub fn new(pool: SqlitePool, root: PathBuf, max_file_size: u64) -> Self {
        Self {
            pool,
            root,
            max_file_size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ensures the blob and temp directories exist.
    pub async fn ensure_layout(&self) -> Result<(), VaultError> {
        tokio::fs::create_dir_all(self.root.join("blobs")).await?;
        tokio::fs::create_dir_all(paths::tmp_dir(&self.root)).await?;
        Ok(())
    }

    /// Fetches the file record for a normalized path, deleted or not.
    pub async fn file_record(&self, path: &str) -> Result<Option<FileRecord>, VaultError> {
        let row = sqlx::query(
            "SELECT path, created_at, content_type, current_version, is_deleted FROM files WHERE path = ?",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| FileRecord {
            path: r.get("path"),
            created_at: r.get("created_at"),
            content_type: r.get("content_type"),
            current_version: r.get("current_version"),
            is_deleted: r.get::<i64, _>("is_deleted") != 0,
        }))
    }

    /// Like [`file_record`](Self::file_record), but `NotFound` for unknown
    /// and soft-deleted paths.
    pub async fn live_file(&self, path: &str) -> Result<FileRecord, VaultError> {
        match self.file_record(path).await? {
            Some(f) if !f.is_deleted => Ok(f),
            _ => Err(VaultError::NotFound(format!("no such file: {}", path))),
        }
    }

    /// Appends a new version for `path` and moves the current pointer to it.
    ///
    /// The caller must hold the per-path lock and must already have applied
    /// the overwrite policy. Sequence assignment, the blob write, and the
    /// pointer update happen in that order; any failure before the final
    /// commit leaves the current pointer unchanged.
    pub async fn put_version(
        &self,
        path: &str,
        content: &[u8],
        creator: &str,
        content_type: Option<&str>,
    ) -> Result<VersionMeta, VaultError> {
        if content.len() as u64 > self.max_file_size {
            return Err(VaultError::TooLarge {
                size: content.len() as u64,
                max: self.max_file_size,
            });
        }

        let existing = self.file_record(path).await?;

        // Stable under the caller's path lock.
        let row =
            sqlx::query("SELECT COALESCE(MAX(seq), 0) AS max_seq, COALESCE(MAX(created_at), 0) AS last_ts FROM versions WHERE path = ?")
                .bind(path)
                .fetch_one(&self.pool)
                .await?;
        let max_seq: i64 = row.get("max_seq");
        let last_ts: i64 = row.get("last_ts");

        let seq = max_seq + 1;
        // Clamp so per-path version timestamps are strictly increasing even
        // when the wall clock does not advance between uploads.
        let created_at = now_micros().max(last_ts + 1);
        let digest = digest_hex(content);
        let size = content.len() as i64;

        // Blob write: temp file, then atomic rename into the final,
        // uniquely-named location. Committed blobs are never rewritten;
        // a leftover from an earlier failed attempt at this same seq was
        // never visible and may be replaced.
        let blob = paths::blob_path(&self.root, path, seq);
        if let Some(parent) = blob.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = paths::tmp_path(&self.root);
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &blob).await?;

        // Metadata commit: version row + current pointer in one transaction.
        let content_type = content_type
            .map(str::to_string)
            .or_else(|| existing.as_ref().map(|f| f.content_type.clone()))
            .unwrap_or_else(|| paths::guess_content_type(path).to_string());
        let file_created_at = existing.as_ref().map(|f| f.created_at).unwrap_or(created_at);

        // File row first: the version row's foreign key needs it.
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO files (path, created_at, content_type, current_version, is_deleted)
            VALUES (?, ?, ?, ?, 0)
            ON CONFLICT(path) DO UPDATE SET
                content_type = excluded.content_type,
                current_version = excluded.current_version,
                is_deleted = 0
            "#,
        )
        .bind(path)
        .bind(file_created_at)
        .bind(&content_type)
        .bind(seq)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO versions (path, seq, digest, size, created_at, created_by) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(path)
        .bind(seq)
        .bind(&digest)
        .bind(size)
        .bind(created_at)
        .bind(creator)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!("stored {} v{} ({} bytes, digest {})", path, seq, size, digest);

        Ok(VersionMeta {
            path: path.to_string(),
            seq,
            digest,
            size,
            created_at,
            created_by: creator.to_string(),
        })
    }

    /// Fetches version metadata without touching the blob.
    pub async fn version_meta(&self, path: &str, seq: i64) -> Result<VersionMeta, VaultError> {
        let row = sqlx::query(
            "SELECT path, seq, digest, size, created_at, created_by FROM versions WHERE path = ? AND seq = ?",
        )
        .bind(path)
        .bind(seq)
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or_else(|| {
            VaultError::NotFound(format!("no version {} for path: {}", seq, path))
        })?;

        Ok(VersionMeta {
            path: row.get("path"),
            seq: row.get("seq"),
            digest: row.get("digest"),
            size: row.get("size"),
            created_at: row.get("created_at"),
            created_by: row.get("created_by"),
        })
    }

    /// Reads a version's metadata and content. `seq = None` resolves the
    /// current pointer. The blob is re-hashed on every read; a mismatch is
    /// reported as `CorruptedContent`, never silently repaired.
    pub async fn get_version(
        &self,
        path: &str,
        seq: Option<i64>,
    ) -> Result<(VersionMeta, Vec<u8>), VaultError> {
        let file = self.live_file(path).await?;
        let seq = seq.unwrap_or(file.current_version);
        let meta = self.version_meta(path, seq).await?;

        let blob = paths::blob_path(&self.root, path, seq);
        let content = tokio::fs::read(&blob).await?;

        let actual = digest_hex(&content);
        if actual != meta.digest {
            warn!("digest mismatch reading {} v{}", path, seq);
            return Err(VaultError::CorruptedContent {
                path: path.to_string(),
                seq,
                expected: meta.digest,
                actual,
            });
        }

        Ok((meta, content))
    }

    /// All versions of a live path, oldest first.
    pub async fn list_versions(&self, path: &str) -> Result<Vec<VersionMeta>, VaultError> {
        self.live_file(path).await?;

        let rows = sqlx::query(
            "SELECT path, seq, digest, size, created_at, created_by FROM versions WHERE path = ? ORDER BY seq ASC",
        )
        .bind(path)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| VersionMeta {
                path: r.get("path"),
                seq: r.get("seq"),
                digest: r.get("digest"),
                size: r.get("size"),
                created_at: r.get("created_at"),
                created_by: r.get("created_by"),
            })
            .collect())
    }

    /// Soft-deletes a live path. Version rows and blobs stay until purge.
    /// Caller holds the per-path lock.
    pub async fn soft_delete(&self, path: &str) -> Result<(), VaultError> {
        self.live_file(path).await?;
        sqlx::query("UPDATE files SET is_deleted = 1 WHERE path = ?")
            .bind(path)
            .execute(&self.pool)
            .await?;
        info!("soft-deleted {}", path);
        Ok(())
    }

    /// Removes a path's file record, version rows, and blob directory.
    /// Works on soft-deleted paths too. Caller holds the per-path lock and
    /// is responsible for the edge cascade.
    pub async fn purge(&self, path: &str) -> Result<(), VaultError> {
        if self.file_record(path).await?.is_none() {
            return Err(VaultError::NotFound(format!("no such file: {}", path)));
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM versions WHERE path = ?")
            .bind(path)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM files WHERE path = ?")
            .bind(path)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        // Metadata rows are gone, so the blobs are unreferenced garbage;
        // failing to remove them is not an error worth surfacing.
        let dir = paths::blob_dir(&self.root, path);
        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("could not remove blob dir {}: {}", dir.display(), e);
            }
        }

        info!("purged {}", path);
        Ok(())
    }

    /// Removes in-flight temp files older than `older_than`. A cancelled
    /// upload can strand one; nothing ever references it.
    pub async fn cleanup_temp(&self, older_than: Duration) -> Result<usize, VaultError> {
        let dir = paths::tmp_dir(&self.root);
        let cutoff = std::time::SystemTime::now()
            .checked_sub(older_than)
            .unwrap_or(std::time::UNIX_EPOCH);

        let mut removed = 0usize;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified()?;
            if modified <= cutoff {
                match tokio::fs::remove_file(entry.path()).await {
                    Ok(()) => removed += 1,
                    Err(e) => warn!("could not remove temp file {:?}: {}", entry.path(), e),
                }
            }
        }

        debug!("temp cleanup removed {} file(s)", removed);
        Ok(removed)
    }
}
