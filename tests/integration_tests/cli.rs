//! The `repo-explorer` binary.

use std::path::Path;
use std::process::{Command, Output};

use crate::common::TestTree;

fn explorer(fixture: &TestTree, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_repo-explorer"))
        .args(args)
        .current_dir(fixture.root())
        // Never read the developer's own config.
        .env(
            "REPO_EXPLORER_CONFIG_PATH",
            fixture.root().join("missing-config.toml"),
        )
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to run repo-explorer")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn root_arg(fixture: &TestTree) -> String {
    fixture.root().to_string_lossy().into_owned()
}

#[test]
fn test_list_json() {
    let fixture = TestTree::new();
    fixture.checkout("api");
    fixture.checkout("team/web");

    let output = explorer(&fixture, &["list", "--json", &root_arg(&fixture)]);
    assert!(output.status.success(), "{}", stderr(&output));

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let nodes = json["nodes"].as_array().unwrap();
    let paths: Vec<_> = nodes
        .iter()
        .map(|n| n["relative_path"].as_str().unwrap())
        .collect();
    assert_eq!(paths, ["api", "team", "team/web"]);
    assert_eq!(nodes[0]["status"]["branch"]["value"], "main");
    assert_eq!(nodes[1]["kind"], "folder");
}

#[test]
fn test_list_table() {
    let fixture = TestTree::new();
    fixture.checkout("api");

    let output = explorer(&fixture, &["list", &root_arg(&fixture)]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("[GIT] api"));
    assert!(out.contains("1 checkout • 0 folders"));
}

#[test]
fn test_list_max_depth_flag() {
    let fixture = TestTree::new();
    fixture.checkout("a/b/deep");
    fixture.checkout("top");

    let output = explorer(
        &fixture,
        &["list", "--json", "--max-depth", "1", &root_arg(&fixture)],
    );
    assert!(output.status.success(), "{}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let paths: Vec<_> = json["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["relative_path"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(paths, ["top", "a"]);
}

#[test]
fn test_list_missing_root_fails() {
    let fixture = TestTree::new();
    let missing = fixture.root().join("nope");

    let output = explorer(&fixture, &["list", &missing.to_string_lossy()]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("repository path does not exist"));
}

#[test]
fn test_search_matches_branch() {
    let fixture = TestTree::new();
    fixture.checkout("api");
    let web = fixture.checkout("web");
    crate::common::git(&web, &["checkout", "-b", "feature/login"]);

    let output = explorer(
        &fixture,
        &["search", "--json", "LOGIN", &root_arg(&fixture)],
    );
    assert!(output.status.success(), "{}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let nodes = json["nodes"].as_array().unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0]["relative_path"], "web");
}

#[test]
fn test_find_unique_and_ambiguous() {
    let fixture = TestTree::new();
    fixture.checkout("service-api");
    fixture.checkout("service-web");

    let unique = explorer(&fixture, &["find", "web", &root_arg(&fixture)]);
    assert!(unique.status.success(), "{}", stderr(&unique));
    assert_eq!(
        Path::new(stdout(&unique).trim()),
        fixture.path("service-web")
    );

    let ambiguous = explorer(&fixture, &["find", "service", &root_arg(&fixture)]);
    assert!(!ambiguous.status.success());
    let err = stderr(&ambiguous);
    assert!(err.contains("2 repositories match 'service'"));
    assert!(err.contains("service-api"));

    let none = explorer(&fixture, &["find", "zzz", &root_arg(&fixture)]);
    assert!(!none.status.success());
    assert!(stderr(&none).contains("no repository matches 'zzz'"));
}

#[test]
fn test_fetch_without_remotes() {
    let fixture = TestTree::new();
    fixture.checkout("api");

    let output = explorer(&fixture, &["fetch", &root_arg(&fixture)]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("[ 1/1] Fetch: api"));
    assert!(out.contains("Succeeded: 1"));
    // A successful fetch re-renders the table.
    assert!(out.contains("[GIT] api"));
}

#[test]
fn test_config_show_defaults() {
    let fixture = TestTree::new();

    let output = explorer(&fixture, &["config", "show"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("not found, using defaults"));
    assert!(out.contains("max-scan-depth = 3"));
    assert!(out.contains("fetch-timeout-seconds = 30"));
}

#[test]
fn test_config_file_sets_default_root() {
    let fixture = TestTree::new();
    fixture.checkout("api");
    let config = fixture.root().join("explorer.toml");
    std::fs::write(
        &config,
        format!(
            "default-repository-path = {:?}\nmax-scan-depth = 2\n",
            fixture.root().to_string_lossy()
        ),
    )
    .unwrap();

    let output = explorer(
        &fixture,
        &["--config", &config.to_string_lossy(), "list", "--json"],
    );
    assert!(output.status.success(), "{}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["nodes"][0]["relative_path"], "api");
}
