//! End-to-end runs of the `mud` binary against a temporary data directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn mud_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("mud");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_path = root.join("mud.toml");
    fs::write(
        &config_path,
        format!(
            r#"
[corpus]
name = "docs"
data_dir = "{}"

[embedding]
provider = "disabled"
"#,
            root.join("data").display()
        ),
    )
    .unwrap();

    let docs = root.join("data/docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("Button.md"), "MudButton\nA button.").unwrap();

    (tmp, config_path)
}

fn run_mud(config: &Path, args: &[&str]) -> Output {
    Command::new(mud_binary())
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("ANTHROPIC_API_KEY")
        .env_remove("ANTHROPIC_SEARCH_MODEL")
        .output()
        .expect("failed to run mud binary")
}

fn seed_store(root: &Path) {
    fs::write(
        root.join("data/docs-embeddings.jsonl"),
        concat!(
            r#"{"metadata":"Button.md","embedding":[1.0,0.0],"text":"MudButtonA button."}"#,
            "\n",
            r#"{"metadata":"Table.md","embedding":[0.0,1.0],"text":"MudTable"}"#,
            "\n"
        ),
    )
    .unwrap();
}

#[test]
fn test_stats_on_fresh_directory() {
    let (_tmp, config) = setup_test_env();
    let output = run_mud(&config, &["stats"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Corpus 'docs'"));
    assert!(stdout.contains("Entries:     0"));
    assert!(stdout.contains("not written"));
}

#[test]
fn test_ingest_skips_populated_store() {
    let (tmp, config) = setup_test_env();
    seed_store(tmp.path());

    let output = run_mud(&config, &["ingest"]);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("store already populated: 2 entries"));
    assert!(!tmp.path().join("data/docs.jsonl").exists());
}

#[test]
fn test_ingest_with_disabled_provider_fails() {
    let (tmp, config) = setup_test_env();
    let output = run_mud(&config, &["ingest"]);

    assert!(!output.status.success());
    // The corpus file is written before embedding starts.
    assert!(tmp.path().join("data/docs.jsonl").exists());
}

#[test]
fn test_search_requires_ingest() {
    let (_tmp, config) = setup_test_env();
    let output = run_mud(&config, &["search", "button"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("mud ingest"));
}

#[test]
fn test_chat_requires_credentials() {
    let (tmp, config) = setup_test_env();
    seed_store(tmp.path());

    let output = Command::new(mud_binary())
        .arg("--config")
        .arg(&config)
        .arg("chat")
        .current_dir(tmp.path())
        .env_remove("ANTHROPIC_API_KEY")
        .env_remove("ANTHROPIC_SEARCH_MODEL")
        .output()
        .expect("failed to run mud binary");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ANTHROPIC_API_KEY"));
}

#[test]
fn test_rebuild_recovers_corrupt_store() {
    let (tmp, config) = setup_test_env();
    let store = tmp.path().join("data/docs-embeddings.jsonl");
    fs::write(
        &store,
        "{\"metadata\":\"Button.md\",\"embedding\":[1.0,0.0],\"text\":\"x\"}\n{\"metadata\":\"Tab",
    )
    .unwrap();

    let output = run_mud(&config, &["stats"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Corrupt vector store entry"));

    // The disabled provider fails the embedding step, after the truncation.
    let output = run_mud(&config, &["ingest", "--rebuild"]);
    assert!(!output.status.success());
    assert_eq!(fs::read_to_string(&store).unwrap(), "");

    let output = run_mud(&config, &["stats"]);
    assert!(output.status.success());
}
