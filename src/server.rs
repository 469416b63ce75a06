//! Thin HTTP adapter over the vault operation set.
//!
//! Routing stays deliberately narrow: every handler validates its inputs,
//! calls one [`Vault`] operation, and maps the typed error to a status code.
//! Authentication lives in front of this server; the caller supplies an
//! already-authenticated identity through the `x-creator` header.
//!
//! # Endpoints
//!
//! | Method   | Path | Description |
//! |----------|------|-------------|
//! | `POST`   | `/files/{*path}` | Upload (raw body, `?overwrite=`) |
//! | `GET`    | `/files/{*path}` | Download (`?version=`) |
//! | `DELETE` | `/files/{*path}` | Soft delete (`?purge=true` to purge) |
//! | `GET`    | `/info/{*path}` | File record |
//! | `GET`    | `/versions/{*path}` | Version history, oldest first |
//! | `POST`   | `/rollback/{*path}` | Append a copy of `?version=` |
//! | `POST`   | `/batch` | Batch upload (base64 contents) |
//! | `GET`    | `/list` | List live files (`?prefix=&extension=&skip=&limit=`) |
//! | `POST`   | `/relations` | Add a context edge |
//! | `DELETE` | `/relations/{id}` | Remove a context edge |
//! | `GET`    | `/relations/neighbors/{*path}` | Neighbors (`?direction=`) |
//! | `GET`    | `/relations/traverse/{*path}` | BFS reachability (`?depth=`) |
//! | `GET`    | `/stats` | Aggregate statistics |
//! | `GET`    | `/health` | Health check (returns version) |
//!
//! # Error contract
//!
//! ```json
//! { "error": { "code": "conflict", "message": "path already exists: ..." } }
//! ```
//!
//! Codes: `invalid_path` (400), `invalid_edge` (400), `not_found` (404),
//! `conflict` (409), `too_large` (413), `corrupted_content` (500),
//! `storage_io` (500).

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::VaultError;
use crate::models::{BatchItemResult, BatchOutcome, Direction};
use crate::vault::Vault;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    vault: Arc<Vault>,
}

/// Opens the vault and serves the API on `[server].bind` until terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let vault = Arc::new(Vault::open(config).await?);
    let state = AppState { vault };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route(
            "/files/{*path}",
            post(handle_upload).get(handle_download).delete(handle_delete),
        )
        .route("/info/{*path}", get(handle_info))
        .route("/versions/{*path}", get(handle_versions))
        .route("/rollback/{*path}", post(handle_rollback))
        .route("/batch", post(handle_batch))
        .route("/list", get(handle_list))
        .route("/relations", post(handle_add_relation))
        .route("/relations/{id}", delete(handle_remove_relation))
        .route("/relations/neighbors/{*path}", get(handle_neighbors))
        .route("/relations/traverse/{*path}", get(handle_traverse))
        .route("/stats", get(handle_stats))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("context-vault listening on http://{}", config.server.bind);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
struct ApiError(VaultError);

impl From<VaultError> for ApiError {
    fn from(e: VaultError) -> Self {
        ApiError(e)
    }
}

/// Maps each error variant to its HTTP status code.
fn status_for(err: &VaultError) -> StatusCode {
    match err {
        VaultError::InvalidPath(_) | VaultError::InvalidEdge(_) => StatusCode::BAD_REQUEST,
        VaultError::NotFound(_) => StatusCode::NOT_FOUND,
        VaultError::Conflict(_) => StatusCode::CONFLICT,
        VaultError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        VaultError::CorruptedContent { .. } | VaultError::Io(_) | VaultError::Db(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.0.code().to_string(),
                message: self.0.to_string(),
            },
        };
        (status_for(&self.0), Json(body)).into_response()
    }
}

fn creator_from(headers: &HeaderMap) -> String {
    headers
        .get("x-creator")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("anonymous")
        .to_string()
}

// ============ File operations ============

#[derive(Deserialize)]
struct UploadQuery {
    #[serde(default)]
    overwrite: bool,
}

async fn handle_upload(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let creator = creator_from(&headers);
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|ct| *ct != "application/octet-stream");

    let meta = state
        .vault
        .upload(&path, &body, &creator, query.overwrite, content_type)
        .await?;

    Ok((StatusCode::CREATED, Json(meta)))
}

#[derive(Deserialize)]
struct DownloadQuery {
    version: Option<i64>,
}

async fn handle_download(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let (file, meta, content) = state.vault.download(&path, query.version).await?;

    let headers = [
        (header::CONTENT_TYPE.as_str(), file.content_type),
        ("x-version", meta.seq.to_string()),
        ("x-digest", meta.digest),
    ];
    Ok((headers, Bytes::from(content)).into_response())
}

#[derive(Deserialize)]
struct DeleteQuery {
    #[serde(default)]
    purge: bool,
}

async fn handle_delete(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if query.purge {
        state.vault.purge(&path).await?;
    } else {
        state.vault.delete(&path).await?;
    }
    Ok(Json(serde_json::json!({ "deleted": path, "purged": query.purge })))
}

async fn handle_info(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let file = state.vault.file_info(&path).await?;
    Ok(Json(serde_json::json!({ "file": file })))
}

async fn handle_versions(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let versions = state.vault.list_versions(&path).await?;
    Ok(Json(serde_json::json!({ "versions": versions })))
}

#[derive(Deserialize)]
struct RollbackQuery {
    version: i64,
}

async fn handle_rollback(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<RollbackQuery>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let creator = creator_from(&headers);
    let meta = state.vault.rollback(&path, query.version, &creator).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "version": meta })),
    ))
}

// ============ Batch upload ============

#[derive(Deserialize)]
struct BatchRequest {
    #[serde(default)]
    overwrite: bool,
    files: Vec<BatchFile>,
}

#[derive(Deserialize)]
struct BatchFile {
    path: String,
    /// Base64-encoded content.
    content: String,
}

async fn handle_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BatchRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let creator = creator_from(&headers);

    // Results keep the request's item order, decode failures included.
    let mut results: Vec<BatchItemResult> = Vec::with_capacity(request.files.len());
    for file in request.files {
        let outcome = match base64::engine::general_purpose::STANDARD.decode(&file.content) {
            Ok(bytes) => BatchOutcome::from_upload(
                state
                    .vault
                    .upload(&file.path, &bytes, &creator, request.overwrite, None)
                    .await,
            ),
            Err(e) => BatchOutcome::Failed {
                error: format!("invalid base64 content: {}", e),
            },
        };
        results.push(BatchItemResult {
            path: file.path,
            outcome,
        });
    }

    Ok(Json(serde_json::json!({ "results": results })))
}

// ============ Listing & stats ============

#[derive(Deserialize)]
struct ListQuery {
    prefix: Option<String>,
    extension: Option<String>,
    #[serde(default)]
    skip: i64,
    limit: Option<i64>,
}

async fn handle_list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let files = state
        .vault
        .list_files(
            query.prefix.as_deref(),
            query.extension.as_deref(),
            query.skip.max(0),
            query.limit.unwrap_or(100).clamp(1, 1000),
        )
        .await?;
    Ok(Json(serde_json::json!({ "files": files })))
}

async fn handle_stats(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let stats = state.vault.stats().await?;
    Ok(Json(serde_json::json!({ "stats": stats })))
}

// ============ Relations ============

#[derive(Deserialize)]
struct RelationRequest {
    source: String,
    target: String,
    kind: String,
}

async fn handle_add_relation(
    State(state): State<AppState>,
    Json(request): Json<RelationRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let edge = state
        .vault
        .add_relation(&request.source, &request.target, &request.kind)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "edge": edge })),
    ))
}

async fn handle_remove_relation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.vault.remove_relation(&id).await?;
    Ok(Json(serde_json::json!({ "removed": id })))
}

#[derive(Deserialize)]
struct NeighborsQuery {
    direction: Option<String>,
}

async fn handle_neighbors(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<NeighborsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let direction = match query.direction.as_deref() {
        Some(s) => Direction::from_str(s)?,
        None => Direction::Outgoing,
    };
    let neighbors = state.vault.neighbors(&path, direction).await?;
    Ok(Json(serde_json::json!({ "neighbors": neighbors })))
}

#[derive(Deserialize)]
struct TraverseQuery {
    depth: Option<u32>,
}

async fn handle_traverse(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<TraverseQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let reached = state
        .vault
        .traverse(&path, query.depth.unwrap_or(u32::MAX))
        .await?;
    Ok(Json(serde_json::json!({ "reached": reached })))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DbConfig, GraphConfig, ServerConfig, StorageConfig};

    async fn test_state() -> (tempfile::TempDir, AppState) {
        let tmp = tempfile::TempDir::new().unwrap();
        let cfg = Config {
            db: DbConfig {
                path: tmp.path().join("data/cvault.sqlite"),
            },
            storage: StorageConfig {
                root: tmp.path().join("data/files"),
                max_file_size: 1024 * 1024,
            },
            server: ServerConfig {
                bind: "127.0.0.1:0".to_string(),
            },
            graph: GraphConfig::default(),
        };
        let vault = Arc::new(Vault::open(&cfg).await.unwrap());
        (tmp, AppState { vault })
    }

    #[tokio::test]
    async fn batch_results_follow_request_order() {
        let (_tmp, state) = test_state().await;
        let encode = |b: &[u8]| base64::engine::general_purpose::STANDARD.encode(b);

        let request = BatchRequest {
            overwrite: false,
            files: vec![
                BatchFile {
                    path: "a.txt".to_string(),
                    content: encode(b"a"),
                },
                BatchFile {
                    path: "bad.txt".to_string(),
                    content: "!!not base64!!".to_string(),
                },
                BatchFile {
                    path: "b.txt".to_string(),
                    content: encode(b"b"),
                },
            ],
        };

        let Json(body) = handle_batch(State(state), HeaderMap::new(), Json(request))
            .await
            .unwrap();
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0]["path"], "a.txt");
        assert_eq!(results[0]["status"], "uploaded");
        assert_eq!(results[1]["path"], "bad.txt");
        assert_eq!(results[1]["status"], "failed");
        assert_eq!(results[2]["path"], "b.txt");
        assert_eq!(results[2]["status"], "uploaded");
    }

    #[test]
    fn error_variants_map_to_expected_status_codes() {
        assert_eq!(
            status_for(&VaultError::InvalidPath("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&VaultError::InvalidEdge("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&VaultError::NotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&VaultError::Conflict("x".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&VaultError::TooLarge { size: 2, max: 1 }),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            status_for(&VaultError::CorruptedContent {
                path: "a".into(),
                seq: 1,
                expected: "aa".into(),
                actual: "bb".into()
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
