use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn cvault_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("cvault");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // Local files to upload
    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("report.md"),
        "# Quarterly Report\n\nNumbers went up.\n",
    )
    .unwrap();
    fs::write(
        files_dir.join("notes.txt"),
        "Meeting notes.\nAction items pending.\n",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/cvault.sqlite"

[storage]
root = "{root}/data/files"
max_file_size = 1048576

[server]
bind = "127.0.0.1:8543"

[graph]
max_depth = 16
"#,
        root = root.display()
    );

    let config_path = config_dir.join("cvault.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_cvault(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = cvault_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run cvault binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_cvault(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/cvault.sqlite").exists());
    assert!(tmp.path().join("data/files/blobs").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_cvault(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_cvault(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_put_get_roundtrip() {
    let (tmp, config_path) = setup_test_env();
    let local = tmp.path().join("files/report.md");

    run_cvault(&config_path, &["init"]);

    let (stdout, stderr, success) = run_cvault(
        &config_path,
        &["put", local.to_str().unwrap(), "docs/report.md"],
    );
    assert!(success, "put failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("stored docs/report.md v1"));
    assert!(stdout.contains("digest:"));

    let out = tmp.path().join("fetched.md");
    let (stdout, _, success) = run_cvault(
        &config_path,
        &["get", "docs/report.md", "--output", out.to_str().unwrap()],
    );
    assert!(success, "get failed: {}", stdout);
    assert_eq!(
        fs::read(&out).unwrap(),
        fs::read(&local).unwrap(),
        "downloaded content must match the uploaded file"
    );
}

#[test]
fn test_put_conflict_and_overwrite() {
    let (tmp, config_path) = setup_test_env();
    let local = tmp.path().join("files/notes.txt");

    run_cvault(&config_path, &["init"]);
    let (_, _, success) = run_cvault(
        &config_path,
        &["put", local.to_str().unwrap(), "notes.txt"],
    );
    assert!(success);

    // Same path again without --overwrite must fail.
    let (_, stderr, success) = run_cvault(
        &config_path,
        &["put", local.to_str().unwrap(), "notes.txt"],
    );
    assert!(!success, "put over an existing path should fail");
    assert!(
        stderr.contains("conflict"),
        "Should report a conflict, got: {}",
        stderr
    );

    let (stdout, _, success) = run_cvault(
        &config_path,
        &["put", local.to_str().unwrap(), "notes.txt", "--overwrite"],
    );
    assert!(success, "put --overwrite failed: {}", stdout);
    assert!(stdout.contains("stored notes.txt v2"));

    // Both versions are listed, oldest first.
    let (stdout, _, success) = run_cvault(&config_path, &["versions", "notes.txt"]);
    assert!(success);
    assert!(stdout.contains("v1"));
    assert!(stdout.contains("v2"));
}

#[test]
fn test_get_old_version() {
    let (tmp, config_path) = setup_test_env();
    let v1 = tmp.path().join("v1.txt");
    let v2 = tmp.path().join("v2.txt");
    fs::write(&v1, "first").unwrap();
    fs::write(&v2, "second").unwrap();

    run_cvault(&config_path, &["init"]);
    run_cvault(&config_path, &["put", v1.to_str().unwrap(), "doc.txt"]);
    run_cvault(
        &config_path,
        &["put", v2.to_str().unwrap(), "doc.txt", "--overwrite"],
    );

    let (stdout, _, success) = run_cvault(&config_path, &["get", "doc.txt", "--version", "1"]);
    assert!(success);
    assert_eq!(stdout, "first");

    let (stdout, _, success) = run_cvault(&config_path, &["get", "doc.txt"]);
    assert!(success);
    assert_eq!(stdout, "second");
}

#[test]
fn test_get_missing_path() {
    let (_tmp, config_path) = setup_test_env();

    run_cvault(&config_path, &["init"]);
    let (_, stderr, success) = run_cvault(&config_path, &["get", "nonexistent.txt"]);
    assert!(!success, "get with missing path should fail");
    assert!(
        stderr.contains("not found"),
        "Should report not found, got: {}",
        stderr
    );
}

#[test]
fn test_put_rejects_escaping_path() {
    let (tmp, config_path) = setup_test_env();
    let local = tmp.path().join("files/notes.txt");

    run_cvault(&config_path, &["init"]);
    let (_, stderr, success) = run_cvault(
        &config_path,
        &["put", local.to_str().unwrap(), "../outside.txt"],
    );
    assert!(!success, "escaping path should be rejected");
    assert!(
        stderr.contains("invalid path"),
        "Should report invalid path, got: {}",
        stderr
    );
}

#[test]
fn test_ls_filters() {
    let (tmp, config_path) = setup_test_env();
    let report = tmp.path().join("files/report.md");
    let notes = tmp.path().join("files/notes.txt");

    run_cvault(&config_path, &["init"]);
    run_cvault(&config_path, &["put", report.to_str().unwrap(), "docs/report.md"]);
    run_cvault(&config_path, &["put", notes.to_str().unwrap(), "misc/notes.txt"]);

    let (stdout, _, success) = run_cvault(&config_path, &["ls"]);
    assert!(success);
    assert!(stdout.contains("docs/report.md"));
    assert!(stdout.contains("misc/notes.txt"));
    assert!(stdout.contains("2 file(s)"));

    let (stdout, _, _) = run_cvault(&config_path, &["ls", "--prefix", "docs/"]);
    assert!(stdout.contains("docs/report.md"));
    assert!(!stdout.contains("misc/notes.txt"));
    assert!(stdout.contains("1 file(s)"));

    let (stdout, _, _) = run_cvault(&config_path, &["ls", "--extension", "txt"]);
    assert!(stdout.contains("misc/notes.txt"));
    assert!(!stdout.contains("docs/report.md"));
}

#[test]
fn test_rm_soft_then_purge() {
    let (tmp, config_path) = setup_test_env();
    let local = tmp.path().join("files/notes.txt");

    run_cvault(&config_path, &["init"]);
    run_cvault(&config_path, &["put", local.to_str().unwrap(), "a.txt"]);

    let (stdout, _, success) = run_cvault(&config_path, &["rm", "a.txt"]);
    assert!(success);
    assert!(stdout.contains("deleted a.txt"));

    // Soft-deleted: reads fail but the blob survives.
    let (_, _, success) = run_cvault(&config_path, &["get", "a.txt"]);
    assert!(!success);
    assert!(tmp.path().join("data/files/blobs/a.txt/v1").exists());

    // Purge works on a soft-deleted path and removes the blobs.
    let (stdout, _, success) = run_cvault(&config_path, &["rm", "a.txt", "--purge"]);
    assert!(success);
    assert!(stdout.contains("purged a.txt"));
    assert!(!tmp.path().join("data/files/blobs/a.txt").exists());
}

#[test]
fn test_rollback() {
    let (tmp, config_path) = setup_test_env();
    let v1 = tmp.path().join("v1.txt");
    let v2 = tmp.path().join("v2.txt");
    fs::write(&v1, "original").unwrap();
    fs::write(&v2, "edited").unwrap();

    run_cvault(&config_path, &["init"]);
    run_cvault(&config_path, &["put", v1.to_str().unwrap(), "doc.txt"]);
    run_cvault(
        &config_path,
        &["put", v2.to_str().unwrap(), "doc.txt", "--overwrite"],
    );

    let (stdout, stderr, success) =
        run_cvault(&config_path, &["rollback", "doc.txt", "--to", "1"]);
    assert!(success, "rollback failed: {}", stderr);
    assert!(stdout.contains("rolled back doc.txt to v1 as new v3"));

    let (stdout, _, _) = run_cvault(&config_path, &["get", "doc.txt"]);
    assert_eq!(stdout, "original");
}

#[test]
fn test_link_neighbors_unlink() {
    let (tmp, config_path) = setup_test_env();
    let report = tmp.path().join("files/report.md");
    let notes = tmp.path().join("files/notes.txt");

    run_cvault(&config_path, &["init"]);
    run_cvault(&config_path, &["put", report.to_str().unwrap(), "report.md"]);
    run_cvault(&config_path, &["put", notes.to_str().unwrap(), "notes.txt"]);

    let (stdout, stderr, success) = run_cvault(
        &config_path,
        &["link", "notes.txt", "report.md", "--kind", "derived-from"],
    );
    assert!(success, "link failed: {}", stderr);
    assert!(stdout.contains("notes.txt -[derived-from]-> report.md"));
    let edge_id = stdout
        .split_whitespace()
        .next()
        .expect("link output starts with the edge id")
        .to_string();

    let (stdout, _, success) = run_cvault(&config_path, &["neighbors", "notes.txt"]);
    assert!(success);
    assert!(stdout.contains("report.md"));
    assert!(stdout.contains("1 neighbor(s)"));

    let (stdout, _, success) = run_cvault(
        &config_path,
        &["neighbors", "report.md", "--direction", "incoming"],
    );
    assert!(success);
    assert!(stdout.contains("notes.txt"));

    let (stdout, _, success) = run_cvault(&config_path, &["unlink", &edge_id]);
    assert!(success);
    assert!(stdout.contains("removed edge"));

    let (stdout, _, _) = run_cvault(&config_path, &["neighbors", "notes.txt"]);
    assert!(stdout.contains("0 neighbor(s)"));
}

#[test]
fn test_link_missing_endpoint_fails() {
    let (tmp, config_path) = setup_test_env();
    let report = tmp.path().join("files/report.md");

    run_cvault(&config_path, &["init"]);
    run_cvault(&config_path, &["put", report.to_str().unwrap(), "report.md"]);

    let (_, stderr, success) = run_cvault(&config_path, &["link", "report.md", "ghost.md"]);
    assert!(!success, "link to a missing file should fail");
    assert!(stderr.contains("not found"));
}

#[test]
fn test_traverse_chain() {
    let (tmp, config_path) = setup_test_env();
    let local = tmp.path().join("files/notes.txt");

    run_cvault(&config_path, &["init"]);
    for name in ["a.txt", "b.txt", "c.txt"] {
        run_cvault(&config_path, &["put", local.to_str().unwrap(), name]);
    }
    run_cvault(&config_path, &["link", "a.txt", "b.txt"]);
    run_cvault(&config_path, &["link", "b.txt", "c.txt"]);

    let (stdout, _, success) = run_cvault(&config_path, &["traverse", "a.txt"]);
    assert!(success);
    assert!(stdout.contains("b.txt"));
    assert!(stdout.contains("c.txt"));
    assert!(stdout.contains("2 reachable file(s)"));

    let (stdout, _, success) =
        run_cvault(&config_path, &["traverse", "a.txt", "--depth", "1"]);
    assert!(success);
    assert!(stdout.contains("1 reachable file(s)"));
}

#[test]
fn test_stats() {
    let (tmp, config_path) = setup_test_env();
    let report = tmp.path().join("files/report.md");
    let notes = tmp.path().join("files/notes.txt");

    run_cvault(&config_path, &["init"]);
    run_cvault(&config_path, &["put", report.to_str().unwrap(), "report.md"]);
    run_cvault(&config_path, &["put", notes.to_str().unwrap(), "notes.txt"]);
    run_cvault(
        &config_path,
        &["put", notes.to_str().unwrap(), "notes.txt", "--overwrite"],
    );

    let (stdout, _, success) = run_cvault(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("files:    2"));
    assert!(stdout.contains("versions: 3"));
    assert!(stdout.contains(".md: 1"));
    assert!(stdout.contains(".txt: 1"));
}

#[test]
fn test_gc_tmp() {
    let (tmp, config_path) = setup_test_env();

    run_cvault(&config_path, &["init"]);
    fs::write(
        tmp.path().join("data/files/tmp/upload_stranded"),
        "half an upload",
    )
    .unwrap();

    let (stdout, _, success) = run_cvault(
        &config_path,
        &["gc-tmp", "--older-than-hours", "0"],
    );
    assert!(success);
    assert!(stdout.contains("removed 1 temp file(s)"));
}
