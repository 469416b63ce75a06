//! The file manager: composes the path resolver, version store, and context
//! graph behind one operation set, and owns the concurrency policy.
//!
//! All mutating operations on the same logical path are mutually exclusive
//! (keyed lock table); independent paths proceed fully in parallel. Reads
//! never take a path lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use log::debug;
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::db;
use crate::error::VaultError;
use crate::graph::ContextGraph;
use crate::migrate;
use crate::models::{
    BatchItemResult, BatchOutcome, Direction, EdgeRecord, FileRecord, NeighborRef, VaultStats,
    VersionMeta,
};
use crate::paths;
use crate::stats;
use crate::store::VersionStore;

/// One async mutex per logical path, created on demand.
struct PathLocks {
    inner: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PathLocks {
    fn new() -> Self {
        Self {
            inner: StdMutex::new(HashMap::new()),
        }
    }

    fn get(&self, path: &str) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().expect("path lock table poisoned");
        map.entry(path.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Escapes `%`, `_`, and `\` so a caller-supplied filter matches literally
/// inside a LIKE pattern.
fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub struct Vault {
    pool: SqlitePool,
    store: VersionStore,
    graph: ContextGraph,
    locks: PathLocks,
    graph_max_depth: u32,
}

impl Vault {
    /// Opens (or initializes) the vault: creates the storage layout,
    /// connects to the metadata store, and runs idempotent migrations.
    pub async fn open(config: &Config) -> Result<Self, VaultError> {
        let pool = db::connect(&config.db.path).await?;
        migrate::run_migrations(&pool).await?;

        let store = VersionStore::new(
            pool.clone(),
            config.storage.root.clone(),
            config.storage.max_file_size,
        );
        store.ensure_layout().await?;

        let graph = ContextGraph::new(pool.clone());

        Ok(Self {
            pool,
            store,
            graph,
            locks: PathLocks::new(),
            graph_max_depth: config.graph.max_depth,
        })
    }

    /// Uploads content to a logical path.
    ///
    /// A new path is always created. An existing live path requires
    /// `overwrite = true`, which appends a version rather than replacing
    /// anything; `overwrite = false` fails with `Conflict` and writes
    /// nothing. Uploading to a soft-deleted path revives it and continues
    /// its version sequence.
    pub async fn upload(
        &self,
        path: &str,
        content: &[u8],
        creator: &str,
        overwrite: bool,
        content_type: Option<&str>,
    ) -> Result<VersionMeta, VaultError> {
        let path = paths::normalize(path)?;
        let lock = self.locks.get(&path);
        let _guard = lock.lock().await;

        if let Some(existing) = self.store.file_record(&path).await? {
            if !existing.is_deleted && !overwrite {
                return Err(VaultError::Conflict(format!(
                    "path already exists: {} (current version {})",
                    path, existing.current_version
                )));
            }
        }

        self.store
            .put_version(&path, content, creator, content_type)
            .await
    }

    /// Uploads several files under one shared overwrite flag. Policy is
    /// applied per item; one failure never rolls back the others.
    pub async fn upload_batch(
        &self,
        items: &[(String, Vec<u8>)],
        creator: &str,
        overwrite: bool,
    ) -> Vec<BatchItemResult> {
        let mut results = Vec::with_capacity(items.len());
        for (path, content) in items {
            let outcome =
                BatchOutcome::from_upload(self.upload(path, content, creator, overwrite, None).await);
            results.push(BatchItemResult {
                path: path.clone(),
                outcome,
            });
        }
        results
    }

    /// Downloads a version (`None` = current). Content is digest-verified.
    pub async fn download(
        &self,
        path: &str,
        version: Option<i64>,
    ) -> Result<(FileRecord, VersionMeta, Vec<u8>), VaultError> {
        let path = paths::normalize(path)?;
        let file = self.store.live_file(&path).await?;
        let (meta, content) = self.store.get_version(&path, version).await?;
        Ok((file, meta, content))
    }

    /// File record for a live path.
    pub async fn file_info(&self, path: &str) -> Result<FileRecord, VaultError> {
        let path = paths::normalize(path)?;
        self.store.live_file(&path).await
    }

    /// All versions of a live path, oldest first.
    pub async fn list_versions(&self, path: &str) -> Result<Vec<VersionMeta>, VaultError> {
        let path = paths::normalize(path)?;
        self.store.list_versions(&path).await
    }

    /// Soft delete: hides the path from reads; versions and blobs remain.
    pub async fn delete(&self, path: &str) -> Result<(), VaultError> {
        let path = paths::normalize(path)?;
        let lock = self.locks.get(&path);
        let _guard = lock.lock().await;
        self.store.soft_delete(&path).await
    }

    /// Purge: removes the file record, all versions, blobs, and every edge
    /// where the path is source or target.
    pub async fn purge(&self, path: &str) -> Result<(), VaultError> {
        let path = paths::normalize(path)?;
        let lock = self.locks.get(&path);
        let _guard = lock.lock().await;

        if self.store.file_record(&path).await?.is_none() {
            return Err(VaultError::NotFound(format!("no such file: {}", path)));
        }
        let removed = self.graph.remove_edges_for(&path).await?;
        debug!("purge {}: cascaded {} edge(s)", path, removed);
        self.store.purge(&path).await
    }

    /// Rolls a path back to an earlier version by appending a new version
    /// with that content. History is never truncated.
    pub async fn rollback(
        &self,
        path: &str,
        version: i64,
        creator: &str,
    ) -> Result<VersionMeta, VaultError> {
        let path = paths::normalize(path)?;
        let lock = self.locks.get(&path);
        let _guard = lock.lock().await;

        let (_, content) = self.store.get_version(&path, Some(version)).await?;
        self.store.put_version(&path, &content, creator, None).await
    }

    pub async fn add_relation(
        &self,
        source: &str,
        target: &str,
        kind: &str,
    ) -> Result<EdgeRecord, VaultError> {
        let source = paths::normalize(source)?;
        let target = paths::normalize(target)?;
        self.graph.add_edge(&source, &target, kind).await
    }

    pub async fn remove_relation(&self, edge_id: &str) -> Result<(), VaultError> {
        self.graph.remove_edge(edge_id).await
    }

    pub async fn neighbors(
        &self,
        path: &str,
        direction: Direction,
    ) -> Result<Vec<NeighborRef>, VaultError> {
        let path = paths::normalize(path)?;
        self.graph.neighbors(&path, direction).await
    }

    /// BFS reachability over outgoing edges. The requested depth is capped
    /// by `[graph].max_depth`.
    pub async fn traverse(&self, path: &str, max_depth: u32) -> Result<Vec<String>, VaultError> {
        let path = paths::normalize(path)?;
        let depth = max_depth.min(self.graph_max_depth);
        self.graph.traverse(&path, depth).await
    }

    /// Lists live files, path-ordered, with optional prefix / extension
    /// filters and pagination. Filter values are matched literally; LIKE
    /// metacharacters in them have no wildcard meaning.
    pub async fn list_files(
        &self,
        prefix: Option<&str>,
        extension: Option<&str>,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<FileRecord>, VaultError> {
        let rows = sqlx::query(
            r#"
            SELECT path, created_at, content_type, current_version, is_deleted
            FROM files
            WHERE is_deleted = 0
              AND (?1 IS NULL OR path LIKE ?1 || '%' ESCAPE '\')
              AND (?2 IS NULL OR path LIKE '%.' || ?2 ESCAPE '\')
            ORDER BY path ASC
            LIMIT ?3 OFFSET ?4
            "#,
        )
        .bind(prefix.map(escape_like))
        .bind(extension.map(escape_like))
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| FileRecord {
                path: r.get("path"),
                created_at: r.get("created_at"),
                content_type: r.get("content_type"),
                current_version: r.get("current_version"),
                is_deleted: r.get::<i64, _>("is_deleted") != 0,
            })
            .collect())
    }

    pub async fn stats(&self) -> Result<VaultStats, VaultError> {
        stats::collect(&self.pool, self.store.root()).await
    }

    /// Removes stranded temp files from cancelled uploads.
    pub async fn cleanup_temp(&self, older_than: Duration) -> Result<usize, VaultError> {
        self.store.cleanup_temp(older_than).await
    }
}
