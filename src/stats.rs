//! Aggregate statistics over the vault.

use std::collections::BTreeMap;
use std::path::Path;

use sqlx::{Row, SqlitePool};

use crate::error::VaultError;
use crate::models::VaultStats;
use crate::paths;

/// Collects counts and sizes over live files. Soft-deleted paths are
/// excluded; their versions still exist but are not reported.
pub async fn collect(pool: &SqlitePool, root: &Path) -> Result<VaultStats, VaultError> {
    let total_files: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE is_deleted = 0")
        .fetch_one(pool)
        .await?;

    let total_versions: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM versions v JOIN files f ON f.path = v.path WHERE f.is_deleted = 0",
    )
    .fetch_one(pool)
    .await?;

    // Size of each live file's current version.
    let total_size: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(v.size), 0)
        FROM files f
        JOIN versions v ON v.path = f.path AND v.seq = f.current_version
        WHERE f.is_deleted = 0
        "#,
    )
    .fetch_one(pool)
    .await?;

    let total_edges: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM edges")
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query("SELECT path FROM files WHERE is_deleted = 0")
        .fetch_all(pool)
        .await?;
    let mut by_extension: BTreeMap<String, i64> = BTreeMap::new();
    for row in &rows {
        let path: String = row.get("path");
        let ext = paths::extension(&path).unwrap_or_else(|| "(none)".to_string());
        *by_extension.entry(ext).or_insert(0) += 1;
    }

    Ok(VaultStats {
        total_files,
        total_versions,
        total_size,
        total_edges,
        by_extension,
        storage_root: root.display().to_string(),
    })
}
