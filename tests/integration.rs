use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use notegraph_core::identity::chunk_id;
use tempfile::TempDir;

fn notegraph_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("notegraph");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    let vault = root.join("vault");
    fs::create_dir_all(vault.join("projects")).unwrap();
    fs::create_dir_all(vault.join(".obsidian")).unwrap();
    fs::write(
        vault.join("projects/alpha.md"),
        "---\ntags: [rust]\n---\n# Alpha\n\nIntro to the alpha project.\n\n## Plan\n\nShip it. See [[beta]].\n",
    )
    .unwrap();
    fs::write(
        vault.join("projects/beta.md"),
        "# Beta\n\nBeta links back to [[alpha]]. #followup\n",
    )
    .unwrap();
    fs::write(
        vault.join("scratch.txt"),
        "Plain text notes about deployment and infrastructure.",
    )
    .unwrap();
    fs::write(vault.join(".obsidian/workspace.json"), "{}").unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/notegraph.sqlite"

[vault]
root = "{root}/vault"
exclude_globs = [".obsidian/**"]

[ingest]
batch_size = 2
batch_delay_ms = 0

[extractors]
ocr_command = "notegraph-test-missing-ocr"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("notegraph.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_notegraph(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = notegraph_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run notegraph binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn ingest_json(config_path: &Path, extra: &[&str]) -> serde_json::Value {
    let mut args = vec!["ingest", "--json", "--progress", "off"];
    args.extend_from_slice(extra);
    let (stdout, stderr, success) = run_notegraph(config_path, &args);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("bad JSON ({}): {}", e, stdout))
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_notegraph(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/notegraph.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_notegraph(&config_path, &["init"]);
    assert!(success1, "First init failed");
    let (_, _, success2) = run_notegraph(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_vault() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_notegraph(&config_path, &["ingest", "--progress", "off"]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("files: 3"));
    assert!(stdout.contains("failed: 0"));
    assert!(stdout.trim_end().ends_with("ok"));
}

#[test]
fn test_ingest_json_summary() {
    let (_tmp, config_path) = setup_test_env();

    let summary = ingest_json(&config_path, &[]);
    assert_eq!(summary["total_files"], 3);
    assert_eq!(summary["processed_files"], 3);
    assert_eq!(summary["by_content_type"]["markdown"], 2);
    assert_eq!(summary["by_content_type"]["plain_text"], 1);
    assert_eq!(summary["dry_run"], false);
    assert_eq!(summary["processed_chunks"], summary["total_chunks"]);
}

#[test]
fn test_ingest_rerun_no_duplicates() {
    let (_tmp, config_path) = setup_test_env();

    let first = ingest_json(&config_path, &[]);
    let second = ingest_json(&config_path, &[]);
    assert_eq!(first["total_chunks"], second["total_chunks"]);

    let (stdout, _, success) = run_notegraph(&config_path, &["stats", "--json"]);
    assert!(success);
    let stats: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(stats["total_chunks"], first["total_chunks"]);
    assert_eq!(stats["documents"], 3);
}

#[test]
fn test_ingest_skip_existing() {
    let (_tmp, config_path) = setup_test_env();

    ingest_json(&config_path, &[]);
    let summary = ingest_json(&config_path, &["--skip-existing"]);
    assert_eq!(summary["skipped_files"], 3);
    assert_eq!(summary["processed_chunks"], 0);
}

#[test]
fn test_ingest_dry_run() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) =
        run_notegraph(&config_path, &["ingest", "--dry-run", "--progress", "off"]);
    assert!(success, "dry run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("ingest (dry-run)"));
    assert!(stdout.contains("estimated chunks"));
    assert!(!tmp.path().join("data/notegraph.sqlite").exists());
}

#[test]
fn test_ingest_with_limit() {
    let (_tmp, config_path) = setup_test_env();

    let summary = ingest_json(&config_path, &["--limit", "1"]);
    assert_eq!(summary["total_files"], 1);
}

#[test]
fn test_ingest_invalid_progress_mode() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_notegraph(&config_path, &["ingest", "--progress", "loud"]);
    assert!(!success);
    assert!(stderr.contains("invalid --progress value"));
}

#[test]
fn test_get_chunk() {
    let (_tmp, config_path) = setup_test_env();
    ingest_json(&config_path, &[]);

    let (stdout, _, success) = run_notegraph(&config_path, &["stats", "--json"]);
    assert!(success);
    let stats: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(stats["total_chunks"].as_u64().unwrap() >= 3);

    let id = chunk_id("obsidian", "projects/beta", 0);
    let (stdout, stderr, success) = run_notegraph(&config_path, &["get", &id]);
    assert!(success, "get failed: stdout={}, stderr={}", stdout, stderr);
    let chunk: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(chunk["id"], id.as_str());
    assert!(chunk["text"].as_str().unwrap().contains("Beta links back"));
}

#[test]
fn test_get_missing_chunk() {
    let (_tmp, config_path) = setup_test_env();
    run_notegraph(&config_path, &["init"]);

    let (_, stderr, success) = run_notegraph(&config_path, &["get", "obsidian_nope_0_00000000"]);
    assert!(!success);
    assert!(stderr.contains("chunk not found"));
}

#[test]
fn test_stats_empty_store() {
    let (_tmp, config_path) = setup_test_env();
    run_notegraph(&config_path, &["init"]);

    let (stdout, stderr, success) = run_notegraph(&config_path, &["stats"]);
    assert!(success, "stats failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Chunks:      0"));
}

#[test]
fn test_search_errors_when_provider_disabled() {
    let (_tmp, config_path) = setup_test_env();
    run_notegraph(&config_path, &["init"]);

    let (_, stderr, success) = run_notegraph(&config_path, &["search", "alpha"]);
    assert!(!success);
    assert!(stderr.contains("embedding provider"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_notegraph(&tmp.path().join("absent.toml"), &["stats"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
