use axum::body::Body;
use axum::http::{Request, StatusCode};
use gitlab_webhook::reload::reload_from_disk;
use gitlab_webhook::{AppState, SharedState, api, load_config};
use http_body_util::BodyExt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tower::ServiceExt;

/// Writes `config` to a fresh directory and builds the shared state from it.
fn test_state(config: serde_json::Value) -> (SharedState, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, config.to_string()).unwrap();
    let state = Arc::new(AppState::new(load_config(&path).unwrap(), &path));
    (state, dir)
}

fn push_body(repo: &str, git_ref: &str) -> String {
    serde_json::json!({
        "before": "95790bf891e76fee5e1747ab589903a6a1f80f22",
        "after": "da1560886d4f094c3e6c9ef40349f7d38b5d27d7",
        "ref": git_ref,
        "user_name": "John Smith",
        "user_id": 4,
        "project_id": 15,
        "repository": {
            "name": repo,
            "url": "git@example.com:mike/diaspora.git",
            "description": "",
            "homepage": "http://example.com/mike/diaspora"
        },
        "commits": [],
        "total_commits_count": 0
    })
    .to_string()
}

fn request(method: &str, uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

/// Sends one request and returns its status and body.
async fn send(state: &SharedState, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = api::router(Arc::clone(state)).oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

fn touch(marker: &Path) -> String {
    format!("touch {}", marker.display())
}

fn append(file: &Path, text: &str) -> String {
    format!("echo {} >> {}", text, file.display())
}

async fn wait_for(path: &Path) -> bool {
    for _ in 0..50 {
        if path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

#[tokio::test]
async fn push_runs_matching_commands_and_returns_empty_200() {
    let out = tempfile::tempdir().unwrap();
    let marker = out.path().join("deployed");
    let (state, _dir) = test_state(serde_json::json!({
        "Port": 0,
        "Repositories": [{"Name": "Diaspora", "Commands": [touch(&marker)], "Branch": "main"}]
    }));

    let (status, body) = send(
        &state,
        request("POST", "/", push_body("Diaspora", "refs/heads/main")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
    assert!(marker.exists(), "inline command finishes before the response");
}

#[tokio::test]
async fn any_path_and_method_is_accepted() {
    let out = tempfile::tempdir().unwrap();
    let log = out.path().join("runs");
    let (state, _dir) = test_state(serde_json::json!({
        "Repositories": [{"Name": "Diaspora", "Commands": [append(&log, "run")]}]
    }));

    for (method, uri) in [("POST", "/hook"), ("PUT", "/a/b/c"), ("GET", "/")] {
        let (status, _) = send(
            &state,
            request(method, uri, push_body("Diaspora", "refs/heads/master")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let runs = fs::read_to_string(&log).unwrap();
    assert_eq!(runs.lines().count(), 3);
}

#[tokio::test]
async fn malformed_json_returns_200_and_runs_nothing() {
    let out = tempfile::tempdir().unwrap();
    let marker = out.path().join("ran");
    let (state, _dir) = test_state(serde_json::json!({
        "Repositories": [{"Name": "Diaspora", "Commands": [touch(&marker)]}]
    }));

    let (status, body) = send(&state, request("POST", "/", "{\"ref\": refs/heads/master")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
    assert!(!marker.exists());
}

#[tokio::test]
async fn empty_branch_rule_fires_on_master_only() {
    let out = tempfile::tempdir().unwrap();
    let log = out.path().join("runs");
    let (state, _dir) = test_state(serde_json::json!({
        "Repositories": [{"Name": "Diaspora", "Commands": [append(&log, "master")], "Branch": ""}]
    }));

    send(&state, request("POST", "/", push_body("Diaspora", "refs/heads/develop"))).await;
    assert!(!log.exists());

    send(&state, request("POST", "/", push_body("Diaspora", "refs/heads/master"))).await;
    assert_eq!(fs::read_to_string(&log).unwrap(), "master\n");
}

#[tokio::test]
async fn every_matching_rule_fires() {
    let out = tempfile::tempdir().unwrap();
    let log = out.path().join("runs");
    let (state, _dir) = test_state(serde_json::json!({
        "Repositories": [
            {"Name": "Diaspora", "Branch": "main", "Commands": [append(&log, "first")]},
            {"Name": "Diaspora", "Branch": "main", "Commands": [append(&log, "second")]}
        ]
    }));

    send(&state, request("POST", "/", push_body("Diaspora", "refs/heads/main"))).await;

    assert_eq!(fs::read_to_string(&log).unwrap(), "first\nsecond\n");
}

#[tokio::test]
async fn failing_command_does_not_stop_the_rest() {
    let out = tempfile::tempdir().unwrap();
    let log = out.path().join("runs");
    let (state, _dir) = test_state(serde_json::json!({
        "Repositories": [
            {"Name": "Diaspora", "Commands": ["echo partial; exit 7", append(&log, "same rule")]},
            {"Name": "Diaspora", "Commands": [append(&log, "next rule")]}
        ]
    }));

    let (status, _) = send(
        &state,
        request("POST", "/", push_body("Diaspora", "refs/heads/master")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(fs::read_to_string(&log).unwrap(), "same rule\nnext rule\n");
}

#[tokio::test]
async fn detached_rule_does_not_delay_the_response() {
    let out = tempfile::tempdir().unwrap();
    let marker = out.path().join("finished");
    let (state, _dir) = test_state(serde_json::json!({
        "execToStd": true,
        "Repositories": [{
            "Name": "Diaspora",
            "Long": true,
            "Commands": [format!("sleep 2; {}", touch(&marker))]
        }]
    }));

    let started = Instant::now();
    let (status, _) = send(
        &state,
        request("POST", "/", push_body("Diaspora", "refs/heads/master")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!marker.exists(), "response came back before the command finished");
    assert!(wait_for(&marker).await, "detached command still runs to completion");
}

#[tokio::test]
async fn reload_switches_the_rule_set() {
    let out = tempfile::tempdir().unwrap();
    let log = out.path().join("runs");
    let (state, _dir) = test_state(serde_json::json!({
        "Repositories": [{"Name": "Diaspora", "Commands": [append(&log, "old")]}]
    }));

    send(&state, request("POST", "/", push_body("Diaspora", "refs/heads/master"))).await;

    let updated = serde_json::json!({
        "Repositories": [{"Name": "Diaspora", "Commands": [append(&log, "new")]}]
    });
    fs::write(&state.config_path, updated.to_string()).unwrap();
    reload_from_disk(&state).await.unwrap();

    send(&state, request("POST", "/", push_body("Diaspora", "refs/heads/master"))).await;

    assert_eq!(fs::read_to_string(&log).unwrap(), "old\nnew\n");
}
