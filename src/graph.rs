//! Context graph: directed relationships between logical files.
//!
//! Edges relate logical files, not version snapshots. Both endpoints must be
//! live at edge-creation time; self-edges and duplicate `(source, target,
//! kind)` triples are rejected. Traversal is breadth-first and cycle-safe.

use std::collections::{HashSet, VecDeque};

use log::info;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::VaultError;
use crate::models::{Direction, EdgeRecord, NeighborRef};

pub struct ContextGraph {
    pool: SqlitePool,
}

impl ContextGraph {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn require_live(&self, path: &str) -> Result<(), VaultError> {
        let live: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM files WHERE path = ? AND is_deleted = 0")
                .bind(path)
                .fetch_optional(&self.pool)
                .await?;
        if live.is_none() {
            return Err(VaultError::NotFound(format!("no such file: {}", path)));
        }
        Ok(())
    }

    /// Adds a directed edge. Endpoints are normalized logical paths.
    pub async fn add_edge(
        &self,
        source: &str,
        target: &str,
        kind: &str,
    ) -> Result<EdgeRecord, VaultError> {
        if source == target {
            return Err(VaultError::InvalidEdge(format!(
                "self-edges are not allowed: {}",
                source
            )));
        }
        if kind.trim().is_empty() {
            return Err(VaultError::InvalidEdge(
                "relation kind must not be empty".to_string(),
            ));
        }
        self.require_live(source).await?;
        self.require_live(target).await?;

        let edge = EdgeRecord {
            id: Uuid::new_v4().to_string(),
            source: source.to_string(),
            target: target.to_string(),
            kind: kind.to_string(),
            created_at: chrono::Utc::now().timestamp_micros(),
        };

        let result = sqlx::query(
            "INSERT INTO edges (id, source, target, kind, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&edge.id)
        .bind(&edge.source)
        .bind(&edge.target)
        .bind(&edge.kind)
        .bind(edge.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                info!("added edge {} -[{}]-> {}", source, kind, target);
                Ok(edge)
            }
            Err(sqlx::Error::Database(db)) if db.kind() == sqlx::error::ErrorKind::UniqueViolation => {
                Err(VaultError::InvalidEdge(format!(
                    "edge already exists: {} -[{}]-> {}",
                    source, kind, target
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn remove_edge(&self, id: &str) -> Result<(), VaultError> {
        let result = sqlx::query("DELETE FROM edges WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(VaultError::NotFound(format!("no such edge: {}", id)));
        }
        Ok(())
    }

    /// Neighboring files in the given direction, deduplicated per edge.
    pub async fn neighbors(
        &self,
        path: &str,
        direction: Direction,
    ) -> Result<Vec<NeighborRef>, VaultError> {
        self.require_live(path).await?;

        let sql = match direction {
            Direction::Outgoing => {
                "SELECT id, target AS other, kind FROM edges WHERE source = ? ORDER BY created_at ASC"
            }
            Direction::Incoming => {
                "SELECT id, source AS other, kind FROM edges WHERE target = ? ORDER BY created_at ASC"
            }
            Direction::Both => {
                r#"
                SELECT id, target AS other, kind FROM edges WHERE source = ?1
                UNION
                SELECT id, source AS other, kind FROM edges WHERE target = ?1
                "#
            }
        };

        let rows = sqlx::query(sql).bind(path).fetch_all(&self.pool).await?;

        Ok(rows
            .iter()
            .map(|r| NeighborRef {
                path: r.get("other"),
                kind: r.get("kind"),
                edge_id: r.get("id"),
            })
            .collect())
    }

    /// Breadth-first reachability over outgoing edges, up to `max_depth`
    /// hops. A visited set makes cycles safe; hitting the depth bound stops
    /// expansion, it is not an error. The starting path is not included.
    pub async fn traverse(
        &self,
        path: &str,
        max_depth: u32,
    ) -> Result<Vec<String>, VaultError> {
        self.require_live(path).await?;

        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(path.to_string());
        let mut reached: Vec<String> = Vec::new();
        let mut frontier: VecDeque<(String, u32)> = VecDeque::new();
        frontier.push_back((path.to_string(), 0));

        while let Some((current, depth)) = frontier.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let rows = sqlx::query("SELECT DISTINCT target FROM edges WHERE source = ?")
                .bind(&current)
                .fetch_all(&self.pool)
                .await?;

            for row in &rows {
                let target: String = row.get("target");
                if visited.insert(target.clone()) {
                    reached.push(target.clone());
                    frontier.push_back((target, depth + 1));
                }
            }
        }

        Ok(reached)
    }

    /// Removes every edge touching `path`, in either role. Used by purge.
    pub async fn remove_edges_for(&self, path: &str) -> Result<u64, VaultError> {
        let result = sqlx::query("DELETE FROM edges WHERE source = ? OR target = ?")
            .bind(path)
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
