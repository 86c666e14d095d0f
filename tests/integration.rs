//! End-to-end tests that drive the `kbctx` binary.
//!
//! Embeddings and web fallback are disabled so no test touches the network.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn kbctx_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("kbctx");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let kb_dir = root.join("kb");
    fs::create_dir_all(kb_dir.join("service")).unwrap();
    fs::write(
        kb_dir.join("manual.txt"),
        "Install the RTK antenna. Connect the power cable. Calibrate the steering motor. ".repeat(5),
    )
    .unwrap();
    fs::write(
        kb_dir.join("service/pump.txt"),
        "Hydraulic pump maintenance requires checking the oil level every fifty hours of \
         operation. Replace the filters each season. "
            .repeat(3),
    )
    .unwrap();
    fs::write(kb_dir.join("readme.md"), "Not part of the knowledge base.").unwrap();

    let config_content = format!(
        r#"[kb]
dir = "{root}/kb"
index_path = "{root}/data/kb_index.json"

[embedding]
provider = "disabled"

[web]
enabled = false

[retrieval]
k = 4
"#,
        root = root.display()
    );

    let config_path = config_dir.join("kb.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_kbctx(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = kbctx_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run kbctx binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_index_builds_and_persists() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_kbctx(&config_path, &["index"]);
    assert!(success, "index failed: {}", stderr);
    assert!(stdout.contains("2 files, 4 chunks"), "stdout: {}", stdout);
    assert!(stdout.contains("model: disabled"));
    assert!(tmp.path().join("data/kb_index.json").exists());
}

#[test]
fn test_index_warm_start_loads() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success) = run_kbctx(&config_path, &["index"]);
    assert!(success);

    let (stdout, stderr, success) = run_kbctx(&config_path, &["index"]);
    assert!(success);
    assert!(stdout.contains("2 files, 4 chunks"));
    assert!(stderr.contains("loaded index"), "stderr: {}", stderr);
}

#[test]
fn test_index_force_rebuilds() {
    let (_tmp, config_path) = setup_test_env();

    run_kbctx(&config_path, &["index"]);
    let (stdout, stderr, success) = run_kbctx(&config_path, &["index", "--force"]);
    assert!(success, "index --force failed: {}", stderr);
    assert!(stdout.contains("4 chunks"));
    assert!(stderr.contains("built index"), "stderr: {}", stderr);
}

#[test]
fn test_search_literal_match() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_kbctx(&config_path, &["search", "antenna RTK"]);
    assert!(success, "search failed: {}", stderr);
    assert!(stdout.starts_with("1. [manual.txt • 0]"), "stdout: {}", stdout);
    assert!(stdout.contains("Install the RTK antenna."));
    assert!(!stdout.contains("pump.txt"));
}

#[test]
fn test_search_no_match_in_degraded_mode() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_kbctx(&config_path, &["search", "sprayer nozzles"]);
    assert!(success);
    assert_eq!(stdout.trim(), "No results.");
}

#[test]
fn test_search_empty_query() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_kbctx(&config_path, &["search", "  "]);
    assert!(success);
    assert_eq!(stdout.trim(), "No results.");
}

#[test]
fn test_context_modes() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_kbctx(&config_path, &["context", "hydraulic pump"]);
    assert!(success);
    assert!(stdout.starts_with("Mode: KB"));
    assert!(stdout.contains("[service/pump.txt • 0]"));

    let (stdout, _, success) = run_kbctx(&config_path, &["context", "sprayer nozzles"]);
    assert!(success);
    assert_eq!(stdout.trim(), "Mode: PLAIN");
}

#[test]
fn test_web_disabled_prints_nothing() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_kbctx(&config_path, &["web", "rtk network"]);
    assert!(success);
    assert_eq!(stdout.trim(), "No web context.");
}

#[test]
fn test_stats_after_index() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_kbctx(&config_path, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("Run `kbctx index` first"));

    run_kbctx(&config_path, &["index"]);
    let (stdout, stderr, success) = run_kbctx(&config_path, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("Files:       2"));
    assert!(stdout.contains("placeholder"));
    assert!(stdout.contains("service/pump.txt"));
}

#[test]
fn test_invalid_config_fails() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("config/bad.toml");
    fs::write(&bad, "[chunking]\nchunk_size = 100\noverlap = 200\n").unwrap();

    let (_, stderr, success) = run_kbctx(&bad, &["index"]);
    assert!(!success);
    assert!(stderr.contains("overlap"), "stderr: {}", stderr);
}

#[cfg(feature = "pdf")]
#[test]
fn test_pdf_is_indexed() {
    let (tmp, config_path) = setup_test_env();
    let phrase = "Set the RTK base station coordinates before the first field pass and \
                  confirm the correction stream on the display terminal every season";
    fs::write(tmp.path().join("kb/base.pdf"), minimal_pdf_with_text(phrase)).unwrap();

    let (stdout, stderr, success) = run_kbctx(&config_path, &["search", "base station"]);
    assert!(success, "search failed: {}", stderr);
    assert!(stdout.contains("[base.pdf • 0]"), "stdout: {}", stdout);
}

/// Minimal single-page PDF showing `text` in Helvetica, with a correct xref.
#[cfg(feature = "pdf")]
fn minimal_pdf_with_text(text: &str) -> Vec<u8> {
    let content = format!("BT /F1 10 Tf 40 700 Td ({}) Tj ET", text);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}
