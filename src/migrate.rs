use sqlx::SqlitePool;

use crate::error::VaultError;

/// Creates the metadata schema. Idempotent; runs on every `Vault::open`.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), VaultError> {
    // Logical files: one row per path, holding the mutable current-version
    // pointer and the soft-delete flag. Content never lives here.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS files (
            path TEXT PRIMARY KEY,
            created_at INTEGER NOT NULL,
            content_type TEXT NOT NULL DEFAULT 'application/octet-stream',
            current_version INTEGER NOT NULL DEFAULT 0,
            is_deleted INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Versions: append-only, keyed by (path, seq). Rows are never updated
    // or renumbered; purge is the only thing that removes them.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS versions (
            path TEXT NOT NULL,
            seq INTEGER NOT NULL,
            digest TEXT NOT NULL,
            size INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            created_by TEXT NOT NULL,
            PRIMARY KEY (path, seq),
            FOREIGN KEY (path) REFERENCES files(path)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Context edges: directed relationships between logical files.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS edges (
            id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            target TEXT NOT NULL,
            kind TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE (source, target, kind),
            FOREIGN KEY (source) REFERENCES files(path),
            FOREIGN KEY (target) REFERENCES files(path)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_versions_path ON versions(path)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target)")
        .execute(pool)
        .await?;

    Ok(())
}
