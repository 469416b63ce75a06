//! # Context Vault
//!
//! A versioned file store with a context graph of relationships between the
//! stored files.
//!
//! Every upload appends an immutable, digest-verified version blob; a
//! logical file's mutable state is just a current-version pointer and a
//! soft-delete flag in SQLite. Overwriting is therefore always an append,
//! never a destructive replace, and the full history of every path stays
//! auditable. On top of the store, a context graph tracks directed
//! relationships (`derived-from`, `references`, ...) between logical files
//! and answers neighbor and reachability queries.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────────────────────┐
//! │ Callers  │──▶│         Vault (manager)       │
//! │ CLI/HTTP │   │  per-path locks, overwrite    │
//! └──────────┘   │  policy, batch orchestration  │
//!                └───────┬───────────────┬───────┘
//!                        ▼               ▼
//!                ┌──────────────┐ ┌──────────────┐
//!                │ VersionStore │ │ ContextGraph │
//!                │ blobs + SQL  │ │   SQL edges  │
//!                └──────┬───────┘ └──────┬───────┘
//!                       ▼                ▼
//!                  blobs/ on disk    SQLite (WAL)
//! ```
//!
//! ## Quick start
//!
//! ```bash
//! cvault init                          # create database and storage layout
//! cvault put report.pdf docs/report.pdf
//! cvault put report.pdf docs/report.pdf --overwrite   # appends version 2
//! cvault versions docs/report.pdf
//! cvault link docs/report.pdf docs/raw.csv --kind derived-from
//! cvault serve                         # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Typed error taxonomy |
//! | [`paths`] | Logical path normalization and blob locations |
//! | [`store`] | Version store (blobs + append-only version records) |
//! | [`graph`] | Context graph (edges, neighbors, traversal) |
//! | [`vault`] | Orchestrator: policy, locking, batch operations |
//! | [`stats`] | Aggregate statistics |
//! | [`server`] | HTTP adapter |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod error;
pub mod graph;
pub mod migrate;
pub mod models;
pub mod paths;
pub mod server;
pub mod stats;
pub mod store;
pub mod vault;
