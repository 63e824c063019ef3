//! CLI integration tests for hybridrag
//!
//! Drives the `hybridrag` binary against throwaway data and config directories.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

struct Env {
    data: TempDir,
    config: TempDir,
}

impl Env {
    fn new() -> Self {
        Self {
            data: TempDir::new().unwrap(),
            config: TempDir::new().unwrap(),
        }
    }

    #[allow(deprecated)]
    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("hybridrag").unwrap();
        cmd.env("HYBRIDRAG_DATA_DIR", self.data.path())
            .env("HYBRIDRAG_CONFIG_DIR", self.config.path())
            .env_remove("HYBRIDRAG_API_KEY")
            .env_remove("OPENAI_API_KEY")
            .env_remove("RUST_LOG");
        cmd
    }

    fn json(&self, args: &[&str]) -> Value {
        let output = self.cmd().arg("--format").arg("json").args(args).output().unwrap();
        assert!(
            output.status.success(),
            "command {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }
}

#[test]
fn test_create_and_list_knowledge_base() {
    let env = Env::new();

    env.cmd()
        .args(["kb", "create", "docs", "--description", "project notes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created knowledge base 'docs'"));

    env.cmd()
        .args(["kb", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("docs"));

    let shown = env.json(&["kb", "show", "docs"]);
    assert_eq!(shown["name"], "docs");
    assert_eq!(shown["description"], "project notes");
}

#[test]
fn test_duplicate_name_reports_error_code() {
    let env = Env::new();
    env.cmd().args(["kb", "create", "docs"]).assert().success();

    env.cmd()
        .args(["kb", "create", "docs"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E002"));
}

#[test]
fn test_missing_knowledge_base_reports_suggestion() {
    let env = Env::new();

    env.cmd()
        .args(["kb", "stats", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E001"))
        .stderr(predicate::str::contains("hybridrag kb list"));
}

#[test]
fn test_add_embed_and_query() {
    let env = Env::new();
    env.cmd().args(["kb", "create", "docs"]).assert().success();

    let added = env.json(&["doc", "add", "docs", "tokio is an async runtime for rust", "--meta", "lang=en"]);
    let tokio_id = added[0]["id"].as_str().unwrap().to_string();
    assert_eq!(added[0]["metadata"]["lang"], "en");
    env.json(&["doc", "add", "docs", "sourdough needs a lively starter"]);

    let stats = env.json(&["kb", "stats", "docs"]);
    assert_eq!(stats["document_count"], 2);
    assert_eq!(stats["embedding_count"], 0);

    let embedded = env.json(&["embed", "docs"]);
    assert_eq!(embedded["embedded"], 2);
    assert_eq!(env.json(&["embed", "docs"])["embedded"], 0);

    let context = env.json(&["query", "docs", "async runtime", "--limit", "2"]);
    assert_eq!(context["query"], "async runtime");
    assert_eq!(context["results"][0]["id"], tokio_id.as_str());
    assert_eq!(context["results"][0]["source"], "hybrid");
    assert_eq!(context["results"][0]["content"], "tokio is an async runtime for rust");

    let found = env.json(&["search", "docs", "async runtime", "--limit", "1"]);
    assert_eq!(found[0]["id"], tokio_id.as_str());
}

#[test]
fn test_bulk_add_from_directory() {
    let env = Env::new();
    let docs = TempDir::new().unwrap();
    std::fs::write(docs.path().join("a.md"), "graph traversal").unwrap();
    std::fs::write(docs.path().join("b.md"), "vector search").unwrap();
    std::fs::write(docs.path().join("empty.md"), "").unwrap();

    env.cmd().args(["kb", "create", "docs"]).assert().success();
    let added = env.json(&["doc", "bulk", "docs", docs.path().to_str().unwrap()]);

    assert_eq!(added.as_array().unwrap().len(), 2);
    assert!(added[0]["metadata"]["path"].as_str().unwrap().ends_with("a.md"));
    assert_eq!(env.json(&["kb", "stats", "docs"])["document_count"], 2);
}

#[test]
fn test_delete_knowledge_base() {
    let env = Env::new();
    env.cmd().args(["kb", "create", "docs"]).assert().success();

    env.cmd()
        .args(["kb", "delete", "docs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("deleted"));

    env.cmd()
        .args(["kb", "show", "docs"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E001"));
}

#[test]
fn test_config_set_get_reset() {
    let env = Env::new();

    env.cmd()
        .args(["config", "set", "retrieval.default_limit", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set retrieval.default_limit = 3"));

    env.cmd()
        .args(["config", "get", "retrieval.default_limit"])
        .assert()
        .success()
        .stdout(predicate::str::diff("3\n"));

    env.cmd().args(["config", "reset"]).assert().success();

    env.cmd()
        .args(["config", "get", "retrieval.default_limit"])
        .assert()
        .success()
        .stdout(predicate::str::diff("10\n"));
}

#[test]
fn test_config_rejects_invalid_values() {
    let env = Env::new();

    env.cmd()
        .args(["config", "set", "indexing.chunk_size", "abc"])
        .assert()
        .failure();

    env.cmd()
        .args(["config", "get", "no.such.key"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown configuration key"));
}
