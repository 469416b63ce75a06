//! Logical path normalization and physical location resolution.
//!
//! Logical paths are relative, `/`-separated identifiers supplied by callers.
//! Normalization is the only gate between caller input and the filesystem:
//! every storage location is derived from an already-normalized path, which
//! keeps blobs confined to the storage root.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::VaultError;

/// Normalizes a caller-supplied logical path.
///
/// Backslashes are folded to `/`, empty and `.` segments are dropped.
/// Rejects absolute paths, `..` segments, NUL bytes, and paths that are
/// empty after normalization with [`VaultError::InvalidPath`].
pub fn normalize(raw: &str) -> Result<String, VaultError> {
    if raw.contains('\0') {
        return Err(VaultError::InvalidPath(
            "path contains NUL byte".to_string(),
        ));
    }

    let unified = raw.replace('\\', "/");
    if unified.starts_with('/') {
        return Err(VaultError::InvalidPath(format!(
            "absolute paths are not allowed: '{}'",
            raw
        )));
    }
    // Windows drive / prefix forms (C:, \\share) are never valid logical paths.
    if unified.contains(':') {
        return Err(VaultError::InvalidPath(format!(
            "path contains ':': '{}'",
            raw
        )));
    }

    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(VaultError::InvalidPath(format!(
                    "path escapes the storage root: '{}'",
                    raw
                )))
            }
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return Err(VaultError::InvalidPath("empty path".to_string()));
    }

    Ok(segments.join("/"))
}

/// Physical location of a version blob. Deterministic: the same normalized
/// path and sequence number always resolve to the same location.
pub fn blob_path(root: &Path, logical: &str, seq: i64) -> PathBuf {
    root.join("blobs").join(logical).join(format!("v{}", seq))
}

/// Directory holding all version blobs for one logical file.
pub fn blob_dir(root: &Path, logical: &str) -> PathBuf {
    root.join("blobs").join(logical)
}

/// Fresh temp-file location for an in-flight blob write.
pub fn tmp_path(root: &Path) -> PathBuf {
    root.join("tmp").join(format!("upload_{}", Uuid::new_v4()))
}

/// Directory for in-flight blob writes.
pub fn tmp_dir(root: &Path) -> PathBuf {
    root.join("tmp")
}

/// Lowercased extension of a logical path, if any.
pub fn extension(logical: &str) -> Option<String> {
    let name = logical.rsplit('/').next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Extension-based content-type hint, used when the caller supplies none.
pub fn guess_content_type(logical: &str) -> &'static str {
    match extension(logical).as_deref() {
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("csv") => "text/csv",
        Some("js") => "text/javascript",
        Some("json") => "application/json",
        Some("yaml") | Some("yml") => "application/yaml",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_accepts_relative_paths() {
        assert_eq!(normalize("docs/readme.txt").unwrap(), "docs/readme.txt");
        assert_eq!(normalize("a/./b//c").unwrap(), "a/b/c");
        assert_eq!(normalize("a\\b\\c.txt").unwrap(), "a/b/c.txt");
    }

    #[test]
    fn normalize_rejects_escapes() {
        assert!(matches!(
            normalize("../etc/passwd"),
            Err(VaultError::InvalidPath(_))
        ));
        assert!(matches!(
            normalize("a/../../b"),
            Err(VaultError::InvalidPath(_))
        ));
        assert!(matches!(
            normalize("/etc/passwd"),
            Err(VaultError::InvalidPath(_))
        ));
        assert!(matches!(
            normalize("C:\\windows"),
            Err(VaultError::InvalidPath(_))
        ));
        assert!(matches!(normalize(""), Err(VaultError::InvalidPath(_))));
        assert!(matches!(normalize("./."), Err(VaultError::InvalidPath(_))));
        assert!(matches!(
            normalize("a\0b"),
            Err(VaultError::InvalidPath(_))
        ));
    }

    #[test]
    fn blob_locations_are_deterministic_and_contained() {
        let root = Path::new("/data/vault");
        let a = blob_path(root, "docs/readme.txt", 3);
        let b = blob_path(root, "docs/readme.txt", 3);
        assert_eq!(a, b);
        assert!(a.starts_with(root));
        assert_eq!(a, root.join("blobs/docs/readme.txt/v3"));
    }

    #[test]
    fn extension_and_content_type() {
        assert_eq!(extension("docs/readme.txt").as_deref(), Some("txt"));
        assert_eq!(extension("archive.tar.GZ").as_deref(), Some("gz"));
        assert_eq!(extension("Makefile"), None);
        assert_eq!(extension(".gitignore"), None);
        assert_eq!(guess_content_type("a/b.json"), "application/json");
        assert_eq!(guess_content_type("blob"), "application/octet-stream");
    }
}
