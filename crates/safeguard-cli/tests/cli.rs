//! CLI tests that run the `safeguard` binary.
//!
//! Token tests point the binary at a wiremock appliance over plain HTTP on
//! 127.0.0.1 and feed the password through stdin.

use std::process::{Output, Stdio};

use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/RSTS/oauth2/token";

const ENV_VARS: &[&str] = &[
    "SAFEGUARD_APPLIANCE",
    "SAFEGUARD_PROVIDER",
    "SAFEGUARD_USERNAME",
    "SAFEGUARD_THUMBPRINT",
    "SAFEGUARD_CERT_FILE",
    "SAFEGUARD_CERT_STORE",
];

fn mock_appliance_url(server: &MockServer) -> String {
    format!("http://127.0.0.1:{}", server.address().port())
}

/// Run the CLI binary with arguments, writing `stdin` to it.
async fn run_cli(args: &[&str], stdin: &str) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_safeguard"));
    cmd.args(args)
        .env("NO_COLOR", "1")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for var in ENV_VARS {
        cmd.env_remove(var);
    }

    let mut child = cmd.spawn().expect("Failed to execute CLI");
    let mut input = child.stdin.take().expect("stdin is piped");
    // The binary may exit before reading, closing the pipe.
    let _ = input.write_all(stdin.as_bytes()).await;
    drop(input);

    child.wait_with_output().await.expect("Failed to wait for CLI")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

// ============================================================================
// Argument Handling
// ============================================================================

#[tokio::test]
async fn test_help_lists_subcommands() {
    let output = run_cli(&["--help"], "").await;

    assert!(output.status.success());
    let help = stdout(&output);
    assert!(help.contains("token"));
    assert!(help.contains("listen"));
}

#[tokio::test]
async fn test_missing_credential_fails() {
    let output = run_cli(&["token", "--appliance", "sg.example.com"], "").await;

    assert!(!output.status.success());
    assert!(stderr(&output).contains("No credential given"));
}

#[tokio::test]
async fn test_plain_http_to_remote_host_is_rejected() {
    let output = run_cli(
        &[
            "token",
            "--appliance",
            "http://sg.example.com",
            "--username",
            "admin",
            "--read-password",
        ],
        "secret123\n",
    )
    .await;

    assert!(!output.status.success());
    assert!(stderr(&output).contains("Invalid appliance address"));
}

#[tokio::test]
async fn test_unknown_thumbprint_in_store_fails() {
    let store = tempfile::tempdir().unwrap();
    let output = run_cli(
        &[
            "token",
            "--appliance",
            "http://127.0.0.1:1",
            "--thumbprint",
            "ABC123",
            "--cert-store",
            store.path().to_str().unwrap(),
        ],
        "",
    )
    .await;

    assert!(!output.status.success());
    assert!(stderr(&output).contains("Failed to authenticate"));
}

// ============================================================================
// Token
// ============================================================================

#[tokio::test]
async fn test_token_with_password_from_stdin() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_json(json!({
            "grant_type": "password",
            "username": "admin",
            "password": "secret123",
            "scope": "rsts:sts:primaryproviderid:local"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "cli-token",
            "expires_in": 900
        })))
        .expect(1)
        .mount(&server)
        .await;

    let url = mock_appliance_url(&server);
    let output = run_cli(
        &[
            "token",
            "--appliance",
            &url,
            "--username",
            "admin",
            "--read-password",
            "--json",
            "--show-token",
        ],
        "secret123\n",
    )
    .await;

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let summary: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(summary["access_token"], "cli-token");
    let remaining = summary["lifetime_remaining"].as_u64().unwrap();
    assert!(remaining > 0 && remaining <= 900);
}

#[tokio::test]
async fn test_token_hidden_unless_requested() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "cli-token",
            "expires_in": 900
        })))
        .mount(&server)
        .await;

    let url = mock_appliance_url(&server);
    let output = run_cli(
        &["token", "--appliance", &url, "--username", "admin", "-p"],
        "secret123\n",
    )
    .await;

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("Authenticated"));
    assert!(text.contains("Lifetime"));
    assert!(!text.contains("cli-token"));
}

#[tokio::test]
async fn test_rejected_password_reports_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "Code": 60108,
            "Message": "Access denied."
        })))
        .mount(&server)
        .await;

    let url = mock_appliance_url(&server);
    let output = run_cli(
        &["token", "--appliance", &url, "--username", "admin", "-p"],
        "wrong\n",
    )
    .await;

    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("Failed to authenticate"));
    assert!(!err.contains("wrong"));
}
