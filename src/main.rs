//! # Context Vault CLI (`cvault`)
//!
//! The `cvault` binary is the operator interface for Context Vault. It
//! provides commands for initializing the store, uploading and downloading
//! versioned files, managing context relations, and starting the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! cvault --config ./config/cvault.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cvault init` | Create the SQLite database and the storage layout |
//! | `cvault put <file> <path>` | Upload a local file to a logical path |
//! | `cvault get <path>` | Download a version to stdout or a file |
//! | `cvault ls` | List live files |
//! | `cvault versions <path>` | Show a path's version history |
//! | `cvault rm <path>` | Soft-delete (or `--purge`) a path |
//! | `cvault rollback <path> --to N` | Append a copy of version N |
//! | `cvault link <src> <dst>` | Add a context edge |
//! | `cvault unlink <edge-id>` | Remove a context edge |
//! | `cvault neighbors <path>` | Show neighboring files |
//! | `cvault traverse <path>` | BFS reachability over outgoing edges |
//! | `cvault stats` | Aggregate statistics |
//! | `cvault gc-tmp` | Remove stranded temp files |
//! | `cvault serve` | Start the HTTP API server |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use context_vault::config;
use context_vault::models::Direction;
use context_vault::server;
use context_vault::vault::Vault;

/// Context Vault CLI — a versioned file store with a context graph.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/cvault.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "cvault",
    about = "Context Vault — a versioned file store with a context graph",
    version,
    long_about = "Context Vault stores files with full version history (every overwrite appends an \
    immutable, digest-verified version) and tracks directed relationships between stored files. \
    It exposes the same operation set through this CLI and an HTTP API."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cvault.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and storage layout.
    ///
    /// Creates the SQLite database, the blob and temp directories, and all
    /// required tables. Idempotent — running it multiple times is safe.
    Init,

    /// Upload a local file to a logical path.
    Put {
        /// Local file to read.
        file: PathBuf,

        /// Logical path to store it under (e.g. `docs/report.pdf`).
        path: String,

        /// Append a new version if the path already exists.
        /// Without this flag an existing path is a conflict.
        #[arg(long)]
        overwrite: bool,

        /// Creator identity recorded on the version.
        #[arg(long, default_value = "cli")]
        creator: String,

        /// Content-type hint (guessed from the extension if omitted).
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Download a version of a logical path.
    Get {
        /// Logical path.
        path: String,

        /// Version to fetch (defaults to the current version).
        #[arg(long)]
        version: Option<i64>,

        /// Write content to this file instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// List live files.
    Ls {
        /// Only paths starting with this prefix.
        #[arg(long)]
        prefix: Option<String>,

        /// Only paths with this extension (e.g. `pdf`).
        #[arg(long)]
        extension: Option<String>,

        /// Number of entries to skip.
        #[arg(long, default_value_t = 0)]
        skip: i64,

        /// Maximum number of entries.
        #[arg(long, default_value_t = 100)]
        limit: i64,
    },

    /// Show a path's version history, oldest first.
    Versions {
        /// Logical path.
        path: String,
    },

    /// Delete a logical path.
    ///
    /// By default this is a soft delete: the path disappears from reads but
    /// every version blob is retained. `--purge` removes the file, all of
    /// its versions, and every context edge touching it.
    Rm {
        /// Logical path.
        path: String,

        /// Permanently remove the path, its versions, and its edges.
        #[arg(long)]
        purge: bool,
    },

    /// Roll a path back to an earlier version.
    ///
    /// Appends a new version whose content equals the given one; history is
    /// never truncated.
    Rollback {
        /// Logical path.
        path: String,

        /// Version to copy.
        #[arg(long)]
        to: i64,

        /// Creator identity recorded on the new version.
        #[arg(long, default_value = "cli")]
        creator: String,
    },

    /// Add a directed context edge between two stored files.
    Link {
        /// Source logical path.
        source: String,

        /// Target logical path.
        target: String,

        /// Relation kind (e.g. `derived-from`, `references`).
        #[arg(long, default_value = "references")]
        kind: String,
    },

    /// Remove a context edge by id.
    Unlink {
        /// Edge id (as printed by `link` or `neighbors`).
        edge_id: String,
    },

    /// Show files related to a path.
    Neighbors {
        /// Logical path.
        path: String,

        /// Edge direction: outgoing, incoming, or both.
        #[arg(long, default_value = "outgoing")]
        direction: String,
    },

    /// Show every file reachable from a path over outgoing edges.
    Traverse {
        /// Logical path.
        path: String,

        /// Maximum number of hops (capped by `[graph].max_depth`).
        #[arg(long, default_value_t = 4)]
        depth: u32,
    },

    /// Show aggregate statistics.
    Stats,

    /// Remove stranded temp files from cancelled uploads.
    GcTmp {
        /// Only remove files older than this many hours.
        #[arg(long, default_value_t = 24)]
        older_than_hours: u64,
    },

    /// Start the HTTP API server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// vault operation set as a JSON API.
    Serve,
}

fn format_ts_iso(micros: i64) -> String {
    chrono::DateTime::from_timestamp_micros(micros)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string())
        .unwrap_or_else(|| micros.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            Vault::open(&cfg).await?;
            println!("Vault initialized successfully.");
        }
        Commands::Put {
            file,
            path,
            overwrite,
            creator,
            content_type,
        } => {
            let content = std::fs::read(&file)?;
            let vault = Vault::open(&cfg).await?;
            let meta = vault
                .upload(&path, &content, &creator, overwrite, content_type.as_deref())
                .await?;
            println!("stored {} v{}", meta.path, meta.seq);
            println!("  digest: {}", meta.digest);
            println!("  size:   {} bytes", meta.size);
        }
        Commands::Get {
            path,
            version,
            output,
        } => {
            let vault = Vault::open(&cfg).await?;
            let (file, meta, content) = vault.download(&path, version).await?;
            match output {
                Some(out) => {
                    std::fs::write(&out, &content)?;
                    println!(
                        "{} v{} ({}, {} bytes) -> {}",
                        meta.path,
                        meta.seq,
                        file.content_type,
                        meta.size,
                        out.display()
                    );
                }
                None => {
                    use std::io::Write;
                    std::io::stdout().write_all(&content)?;
                }
            }
        }
        Commands::Ls {
            prefix,
            extension,
            skip,
            limit,
        } => {
            let vault = Vault::open(&cfg).await?;
            let files = vault
                .list_files(prefix.as_deref(), extension.as_deref(), skip, limit)
                .await?;
            for f in &files {
                println!("{}  v{}  {}", f.path, f.current_version, f.content_type);
            }
            println!("{} file(s)", files.len());
        }
        Commands::Versions { path } => {
            let vault = Vault::open(&cfg).await?;
            let versions = vault.list_versions(&path).await?;
            for v in &versions {
                println!(
                    "v{}  {}  {} bytes  {}  by {}",
                    v.seq,
                    format_ts_iso(v.created_at),
                    v.size,
                    v.digest,
                    v.created_by
                );
            }
        }
        Commands::Rm { path, purge } => {
            let vault = Vault::open(&cfg).await?;
            if purge {
                vault.purge(&path).await?;
                println!("purged {}", path);
            } else {
                vault.delete(&path).await?;
                println!("deleted {}", path);
            }
        }
        Commands::Rollback { path, to, creator } => {
            let vault = Vault::open(&cfg).await?;
            let meta = vault.rollback(&path, to, &creator).await?;
            println!("rolled back {} to v{} as new v{}", meta.path, to, meta.seq);
        }
        Commands::Link {
            source,
            target,
            kind,
        } => {
            let vault = Vault::open(&cfg).await?;
            let edge = vault.add_relation(&source, &target, &kind).await?;
            println!("{}  {} -[{}]-> {}", edge.id, edge.source, edge.kind, edge.target);
        }
        Commands::Unlink { edge_id } => {
            let vault = Vault::open(&cfg).await?;
            vault.remove_relation(&edge_id).await?;
            println!("removed edge {}", edge_id);
        }
        Commands::Neighbors { path, direction } => {
            let vault = Vault::open(&cfg).await?;
            let direction = Direction::from_str(&direction)?;
            let neighbors = vault.neighbors(&path, direction).await?;
            for n in &neighbors {
                println!("{}  [{}]  edge {}", n.path, n.kind, n.edge_id);
            }
            println!("{} neighbor(s)", neighbors.len());
        }
        Commands::Traverse { path, depth } => {
            let vault = Vault::open(&cfg).await?;
            let reached = vault.traverse(&path, depth).await?;
            for p in &reached {
                println!("{}", p);
            }
            println!("{} reachable file(s)", reached.len());
        }
        Commands::Stats => {
            let vault = Vault::open(&cfg).await?;
            let stats = vault.stats().await?;
            println!("files:    {}", stats.total_files);
            println!("versions: {}", stats.total_versions);
            println!("size:     {} bytes", stats.total_size);
            println!("edges:    {}", stats.total_edges);
            println!("root:     {}", stats.storage_root);
            for (ext, count) in &stats.by_extension {
                println!("  .{}: {}", ext, count);
            }
        }
        Commands::GcTmp { older_than_hours } => {
            let vault = Vault::open(&cfg).await?;
            let removed = vault
                .cleanup_temp(Duration::from_secs(older_than_hours * 3600))
                .await?;
            println!("removed {} temp file(s)", removed);
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
