use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use assert_cmd::cargo::CommandCargoExt;
use confluence_cli::ExitCode;
use confluence_test_support::{attachment_list_json, page_json, test_env, PNG_BYTES};
use predicates::prelude::*;
use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONFLUENCE_VARS: [&str; 4] = [
    "CONFLUENCE_URL",
    "CONFLUENCE_USERNAME",
    "CONFLUENCE_API_TOKEN",
    "CONFLUENCE_TIMEOUT_SECS",
];

/// A command isolated from the caller's credentials and working directory.
fn cargo_bin(dir: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("confluence-attach").unwrap();
    cmd.current_dir(dir).env_remove("RUST_LOG");
    for var in CONFLUENCE_VARS {
        cmd.env_remove(var);
    }
    cmd
}

async fn run_against(server: &MockServer, dir: &Path, args: &[&str]) -> Output {
    let mut cmd = Command::cargo_bin("confluence-attach").unwrap();
    cmd.current_dir(dir).env_remove("RUST_LOG");
    for var in CONFLUENCE_VARS {
        cmd.env_remove(var);
    }
    cmd.envs(test_env(&server.uri())).args(args);
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn resolve_prints_body_with_prepended_macro() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("page.xml"), "<p>Intro</p>").unwrap();

    cargo_bin(dir.path())
        .args(["resolve", "page.xml", "flow.png", "--alt", "Flow", "--width", "800"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "<p><strong>Process diagram</strong></p>\n<ac:image ac:alt=\"Flow\" ac:width=\"800\"><ri:attachment ri:filename=\"flow.png\" /></ac:image>\n<p>Intro</p>",
        ));
}

#[test]
fn resolve_reports_no_changes_when_already_embedded() {
    let dir = tempdir().unwrap();
    let body = "<ac:image><ri:attachment ri:filename=\"flow.png\" /></ac:image>";
    fs::write(dir.path().join("page.xml"), body).unwrap();

    cargo_bin(dir.path())
        .args(["resolve", "page.xml", "flow.png", "--in-place"])
        .assert()
        .success()
        .stderr(predicate::str::contains("No changes"));

    assert_eq!(fs::read_to_string(dir.path().join("page.xml")).unwrap(), body);
    assert!(!dir.path().join("page.xml.bak").exists());
}

#[test]
fn resolve_in_place_keeps_backup() {
    let dir = tempdir().unwrap();
    let page = dir.path().join("page.xml");
    fs::write(&page, "<p>Steps</p><p>Outro</p>").unwrap();

    cargo_bin(dir.path())
        .args(["resolve", "page.xml", "flow.png", "--anchor", "<p>Steps</p>", "--in-place"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Updated page.xml"));

    assert_eq!(
        fs::read_to_string(&page).unwrap(),
        "<p>Steps</p>\n<ac:image><ri:attachment ri:filename=\"flow.png\" /></ac:image>\n<p>Outro</p>"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("page.xml.bak")).unwrap(),
        "<p>Steps</p><p>Outro</p>"
    );
}

#[test]
fn resolve_diff_shows_replacement() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("page.xml"),
        "<p>a</p>\n<img src=\"flow.png\" />\n<p>b</p>\n",
    )
    .unwrap();

    cargo_bin(dir.path())
        .args(["resolve", "page.xml", "flow.png", "--diff"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-<img src=\"flow.png\" />"))
        .stdout(predicate::str::contains(
            "+<ac:image><ri:attachment ri:filename=\"flow.png\" /></ac:image>",
        ));
}

#[test]
fn resolve_reads_stdin() {
    let dir = tempdir().unwrap();

    cargo_bin(dir.path())
        .args(["resolve", "-", "flow.png"])
        .write_stdin("<p>Intro</p>")
        .assert()
        .success()
        .stdout(predicate::str::contains("ri:filename=\"flow.png\""));
}

#[test]
fn network_commands_require_credentials() {
    let dir = tempdir().unwrap();

    cargo_bin(dir.path())
        .args(["download", "42", "flow.png"])
        .assert()
        .failure()
        .code(ExitCode::Failure as i32)
        .stderr(predicate::str::contains("CONFLUENCE_URL"));
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_missing_file_makes_no_request() {
    let dir = tempdir().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let output = run_against(&server, dir.path(), &["embed", "42", "absent.png"]).await;

    assert_eq!(output.status.code(), Some(ExitCode::Failure as i32));
    assert!(stderr(&output).contains("File not found: absent.png"));
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_uploads_fetches_and_updates() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("flow.png"), PNG_BYTES).unwrap();

    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/wiki/rest/api/content/42/child/attachment"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(attachment_list_json(&[("att9", "flow.png")])),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wiki/rest/api/content/42"))
        .and(query_param("expand", "body.storage,version"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(page_json("42", "Runbook", 7, "<p>Intro</p>")),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/wiki/rest/api/content/42"))
        .and(body_partial_json(json!({
            "title": "Runbook",
            "version": {"number": 8, "message": "Add flow"},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json("42", "Runbook", 8, "")))
        .expect(1)
        .mount(&server)
        .await;

    let output = run_against(
        &server,
        dir.path(),
        &["embed", "42", "flow.png", "--message", "Add flow"],
    )
    .await;

    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Uploaded attachment: flow.png"));
    assert!(out.contains("Page updated: embedded image macro."));
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_skips_update_when_already_embedded() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("flow.png"), PNG_BYTES).unwrap();
    let body = "<p>x</p><ac:image><ri:attachment ri:filename='flow.png'/></ac:image>";

    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/wiki/rest/api/content/42/child/attachment"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(attachment_list_json(&[("att9", "flow.png")])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wiki/rest/api/content/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json("42", "Runbook", 7, body)))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/wiki/rest/api/content/42"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let output = run_against(&server, dir.path(), &["embed", "42", "flow.png"]).await;

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("Image already embedded; page update skipped."));
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_reports_fetch_failure() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("flow.png"), PNG_BYTES).unwrap();

    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/wiki/rest/api/content/42/child/attachment"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(attachment_list_json(&[("att9", "flow.png")])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wiki/rest/api/content/42"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let output = run_against(&server, dir.path(), &["embed", "42", "flow.png"]).await;

    assert_eq!(output.status.code(), Some(ExitCode::Failure as i32));
    assert!(stdout(&output).contains("Uploaded attachment: flow.png"));
    assert!(stderr(&output).contains("Fetch page failed: HTTP 403"));
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_warns_about_missing_names() {
    let dir = tempdir().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wiki/rest/api/content/42/child/attachment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(attachment_list_json(&[
            ("att1", "old.png"),
            ("att2", "keep.png"),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/wiki/rest/api/content/1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let output = run_against(&server, dir.path(), &["delete", "42", "old.png", "gone.png"]).await;

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("Deleted: old.png"));
    assert!(stderr(&output).contains("Warning: attachment 'gone.png' not found on page"));
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_without_matches_fails() {
    let dir = tempdir().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wiki/rest/api/content/42/child/attachment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(attachment_list_json(&[])))
        .mount(&server)
        .await;

    let output = run_against(&server, dir.path(), &["delete", "42", "gone.png"]).await;

    assert_eq!(output.status.code(), Some(ExitCode::Failure as i32));
    assert!(stderr(&output).contains("No matching attachments to delete."));
}

#[tokio::test(flavor = "multi_thread")]
async fn download_creates_parent_directories() {
    let dir = tempdir().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wiki/download/attachments/42/flow.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG_BYTES.to_vec()))
        .mount(&server)
        .await;

    let output = run_against(
        &server,
        dir.path(),
        &["download", "42", "flow.png", "assets/img/flow.png"],
    )
    .await;

    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Downloaded: "));
    assert_eq!(
        fs::read(dir.path().join("assets/img/flow.png")).unwrap(),
        PNG_BYTES
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn upload_prints_each_stored_title() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("report.pdf"), "pdf").unwrap();

    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/wiki/rest/api/content/42/child/attachment"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(attachment_list_json(&[("att3", "report.pdf")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let output = run_against(&server, dir.path(), &["upload", "42", "report.pdf"]).await;

    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Uploaded: report.pdf"));
}

#[tokio::test(flavor = "multi_thread")]
async fn upload_reports_server_rejection() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("report.pdf"), "pdf").unwrap();

    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(413).set_body_string("too large"))
        .mount(&server)
        .await;

    let output = run_against(&server, dir.path(), &["upload", "42", "report.pdf"]).await;

    assert_eq!(output.status.code(), Some(ExitCode::Failure as i32));
    assert!(stderr(&output).contains("Upload failed: HTTP 413"));
}
