//! End-to-end tests for the `ilens` binary.
//!
//! Each test runs the binary with an isolated home directory so user
//! configuration never leaks in.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A command with no ambient configuration.
fn ilens(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ilens").unwrap();
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("xdg"))
        .env_remove("ISSUELENS_CONFIG")
        .env_remove("ISSUELENS_URL")
        .env_remove("ISSUELENS_USER")
        .env_remove("ISSUELENS_TOKEN")
        .env_remove("RUST_LOG")
        .current_dir(home.path());
    cmd
}

mod surface {
    use super::*;

    #[test]
    fn help_lists_commands() {
        let home = TempDir::new().unwrap();
        ilens(&home)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("relationships"))
            .stdout(predicate::str::contains("cross-ref"))
            .stdout(predicate::str::contains("content"))
            .stdout(predicate::str::contains("metrics"));
    }

    #[test]
    fn version() {
        let home = TempDir::new().unwrap();
        ilens(&home)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::starts_with("ilens "));
    }

    #[test]
    fn bash_completion() {
        let home = TempDir::new().unwrap();
        ilens(&home)
            .args(["completion", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("_ilens"));
    }

    #[test]
    fn bad_issue_key_is_rejected_before_any_request() {
        let home = TempDir::new().unwrap();
        ilens(&home)
            .args(["--url", "http://127.0.0.1:9", "issue", "not-a-key!"])
            .assert()
            .failure()
            .stderr(predicate::str::starts_with("error:"));
    }

    #[test]
    fn missing_tracker_url_fails() {
        let home = TempDir::new().unwrap();
        ilens(&home)
            .args(["issue", "CORE-1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("tracker.base_url"));
    }
}

mod config {
    use super::*;

    #[test]
    fn shows_layers_without_the_token() {
        let home = TempDir::new().unwrap();
        let global = home.path().join("global.toml");
        std::fs::write(
            &global,
            r#"
[tracker]
base_url = "https://jira.example.com"
username = "kim"
token = "super-secret"

[analysis]
max_depth = 3
"#,
        )
        .unwrap();
        let workspace = home.path().join("repo");
        std::fs::create_dir_all(workspace.join(".issuelens")).unwrap();
        std::fs::write(
            workspace.join(".issuelens/config.toml"),
            "[analysis]\nmax_concurrency = 4\n",
        )
        .unwrap();

        ilens(&home)
            .env("ISSUELENS_CONFIG", &global)
            .arg("--cwd")
            .arg(&workspace)
            .arg("config")
            .assert()
            .success()
            .stdout(predicate::str::contains("tracker.base_url = https://jira.example.com"))
            .stdout(predicate::str::contains("tracker.token = (set)"))
            .stdout(predicate::str::contains("analysis.max_depth = 3"))
            .stdout(predicate::str::contains("analysis.max_concurrency = 4"))
            .stdout(predicate::str::contains("super-secret").not());
    }

    #[test]
    fn env_and_flags_override_files() {
        let home = TempDir::new().unwrap();
        let global = home.path().join("global.toml");
        std::fs::write(&global, "[tracker]\nbase_url = \"https://old.example.com\"\n").unwrap();

        ilens(&home)
            .env("ISSUELENS_CONFIG", &global)
            .env("ISSUELENS_URL", "https://env.example.com")
            .args(["--user", "sam", "--json", "config"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"base_url\": \"https://env.example.com\""))
            .stdout(predicate::str::contains("\"username\": \"sam\""));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let home = TempDir::new().unwrap();
        let global = home.path().join("global.toml");
        std::fs::write(&global, "[analysis]\nmax_dpeth = 3\n").unwrap();

        ilens(&home)
            .env("ISSUELENS_CONFIG", &global)
            .arg("config")
            .assert()
            .failure()
            .stderr(predicate::str::contains("max_dpeth"));
    }
}

mod against_server {
    use super::*;

    async fn server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/issue/CORE-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "key": "CORE-1",
                "fields": {
                    "summary": "Checkout hangs",
                    "issuetype": { "name": "Bug" },
                    "status": { "name": "Open", "statusCategory": { "key": "new" } },
                    "issuelinks": [{
                        "type": { "name": "Blocks", "inward": "is blocked by", "outward": "blocks" },
                        "outwardIssue": { "key": "CORE-2" }
                    }]
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/issue/CORE-2"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "errorMessages": ["gone"] })),
            )
            .mount(&server)
            .await;
        server
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn issue_as_json() {
        let server = server().await;
        let url = server.uri();

        let output = tokio::task::spawn_blocking(move || {
            let home = TempDir::new().unwrap();
            ilens(&home)
                .args(["--url", &url, "--json", "issue", "CORE-1"])
                .output()
                .unwrap()
        })
        .await
        .unwrap();

        assert!(output.status.success());
        let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(value["issue"]["key"], "CORE-1");
        assert_eq!(value["issue"]["summary"], "Checkout hangs");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn relationships_warn_when_partial() {
        let server = server().await;
        let url = server.uri();

        let output = tokio::task::spawn_blocking(move || {
            let home = TempDir::new().unwrap();
            ilens(&home)
                .args(["--url", &url, "relationships", "CORE-1"])
                .output()
                .unwrap()
        })
        .await
        .unwrap();

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stdout.contains("CORE-1 blocks CORE-2"));
        assert!(stdout.contains("(unresolved: not_found)"));
        assert!(stderr.contains("result is partial (unresolved-nodes)"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn metrics_count_a_project() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "startAt": 0,
                "total": 2,
                "issues": [
                    { "key": "CORE-1", "fields": {
                        "issuetype": { "name": "Bug" },
                        "status": { "name": "Open" },
                        "priority": { "name": "High" } } },
                    { "key": "CORE-2", "fields": {
                        "issuetype": { "name": "Bug" },
                        "status": { "name": "Done" } } }
                ]
            })))
            .mount(&server)
            .await;
        let url = server.uri();

        let output = tokio::task::spawn_blocking(move || {
            let home = TempDir::new().unwrap();
            ilens(&home)
                .args(["--url", &url, "--json", "metrics", "CORE"])
                .output()
                .unwrap()
        })
        .await
        .unwrap();

        assert!(output.status.success());
        let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(value["total"], 2);
        assert_eq!(value["by_type"]["Bug"], 2);
        assert_eq!(value["by_priority"]["High"], 1);
        assert_eq!(value["by_priority"]["No Priority"], 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_issue_exits_nonzero() {
        let server = server().await;
        let url = server.uri();

        let output = tokio::task::spawn_blocking(move || {
            let home = TempDir::new().unwrap();
            ilens(&home)
                .args(["--url", &url, "issue", "CORE-2"])
                .output()
                .unwrap()
        })
        .await
        .unwrap();

        assert!(!output.status.success());
        assert!(String::from_utf8_lossy(&output.stderr).contains("not found"));
    }
}
