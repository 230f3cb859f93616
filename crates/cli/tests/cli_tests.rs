//! Binary-level tests: exit codes, doctor output, and full runs against a
//! mock completion endpoint.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use cellscribe_io::{open_for_read, CellRef};
use httpmock::prelude::*;
use rust_xlsxwriter::Workbook;
use serde_json::{json, Value};

const SHEET: &str = "Shorts_Automation";
const PATH: &str = "/api/v1/chat/completions";

fn cellscribe(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cellscribe"));
    cmd.current_dir(dir)
        .env_remove("OPENROUTER_API_KEY")
        .env_remove("CELLSCRIBE_WORKBOOK")
        .env_remove("CELLSCRIBE_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

fn workbook(dir: &Path, values: &[(&str, &str)]) -> PathBuf {
    let path = dir.join("YouTubeVideosList.xlsx");
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.set_name(SHEET).unwrap();
    for (at, value) in values {
        let c = CellRef::parse(at).unwrap();
        ws.write_string(c.row, c.col as u16, *value).unwrap();
    }
    wb.save(&path).unwrap();
    path
}

/// Settings file pointing at `workbook` and `endpoint`, default step plan.
fn settings(dir: &Path, workbook: &Path, endpoint: &str) -> PathBuf {
    let path = dir.join("settings.toml");
    let body = format!(
        "[workbook]\npath = '{}'\n\n[completion]\nendpoint = '{}'\n",
        workbook.display(),
        endpoint
    );
    std::fs::write(&path, body).unwrap();
    path
}

fn read(path: &Path, at: &str) -> Option<String> {
    open_for_read(path, SHEET).unwrap().read_cell(CellRef::parse(at).unwrap())
}

fn run_with_stdin(mut cmd: Command, input: &str) -> Output {
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(input.as_bytes()).unwrap();
    child.wait_with_output().unwrap()
}

fn completion(text: &str) -> Value {
    json!({"choices": [{"message": {"content": text}}]})
}

#[test]
fn no_subcommand_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let out = cellscribe(dir.path()).output().unwrap();
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Usage"));
}

#[test]
fn doctor_json_reports_missing_key_and_workbook() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.xlsx");
    let config = settings(dir.path(), &missing, "http://127.0.0.1:9/v1/chat/completions");

    let out = cellscribe(dir.path())
        .args(["doctor", "--json", "--config"])
        .arg(&config)
        .output()
        .unwrap();

    assert_eq!(out.status.code(), Some(0));
    let report: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["schema_version"], 1);
    assert_eq!(report["key"], "missing");
    assert_eq!(report["key_source"], "none");
    assert_eq!(report["workbook"]["exists"], false);
    assert_eq!(report["components"]["reader"], "skipped");
    assert_eq!(report["components"]["document"], "ok");
    assert_eq!(report["components"]["http_client"], "ok");
}

#[test]
fn doctor_lists_sheets_and_detects_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let wb = workbook(dir.path(), &[("C2", "x")]);
    let config = settings(dir.path(), &wb, "http://127.0.0.1:9/v1/chat/completions");
    std::fs::write(dir.path().join(".env"), "OPENROUTER_API_KEY=your-api-key-here\n").unwrap();

    let out = cellscribe(dir.path())
        .args(["doctor", "--json", "--config"])
        .arg(&config)
        .output()
        .unwrap();

    assert_eq!(out.status.code(), Some(0));
    let report: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["key"], "missing");
    assert_eq!(report["key_source"], "placeholder");
    assert_eq!(report["workbook"]["sheet_present"], true);
    assert_eq!(report["workbook"]["sheets"], json!([SHEET]));
    assert_eq!(report["components"]["reader"], "ok");
}

#[test]
fn doctor_survives_broken_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("settings.toml");
    std::fs::write(&config, "[workbook\npath = ").unwrap();

    let out = cellscribe(dir.path())
        .args(["doctor", "--config"])
        .arg(&config)
        .output()
        .unwrap();

    assert_eq!(out.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("config_error:"));
    assert!(stdout.lines().any(|l| l.starts_with("key:") && l.ends_with("missing")));
}

#[test]
fn malformed_config_exits_3() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("settings.toml");
    std::fs::write(&config, "[run]\ncarrier_fidelity = 'sideways'\n").unwrap();

    let out = cellscribe(dir.path()).args(["auto", "--config"]).arg(&config).output().unwrap();
    assert_eq!(out.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&out.stderr).starts_with("error: "));
}

#[test]
fn missing_workbook_exits_4() {
    let dir = tempfile::tempdir().unwrap();
    let config = settings(dir.path(), &dir.path().join("absent.xlsx"), "http://127.0.0.1:9/x");

    let out = cellscribe(dir.path()).args(["auto", "--config"]).arg(&config).output().unwrap();
    assert_eq!(out.status.code(), Some(4));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("hint:"));
}

#[test]
fn missing_sheet_exits_4_with_available_sheets() {
    let dir = tempfile::tempdir().unwrap();
    let wb = workbook(dir.path(), &[]);
    let config = dir.path().join("settings.toml");
    std::fs::write(&config, format!("[workbook]\npath = '{}'\nsheet = 'Other'\n", wb.display())).unwrap();

    let out = cellscribe(dir.path()).args(["run", "--config"]).arg(&config).output().unwrap();
    assert_eq!(out.status.code(), Some(4));
    assert!(String::from_utf8_lossy(&out.stderr).contains(SHEET));
}

#[test]
fn auto_writes_title_to_b4() {
    let dir = tempfile::tempdir().unwrap();
    let wb = workbook(dir.path(), &[("C2", "Video about cats")]);

    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path(PATH)
            .header("authorization", "Bearer sk-cli")
            .body_includes("Video about cats");
        then.status(200).json_body(completion("10 Purr-fect Cat Facts!"));
    });
    let config = settings(dir.path(), &wb, &server.url(PATH));

    let out = cellscribe(dir.path())
        .env("OPENROUTER_API_KEY", "sk-cli")
        .args(["auto", "--config"])
        .arg(&config)
        .output()
        .unwrap();

    assert_eq!(out.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    mock.assert_calls(1);
    assert_eq!(read(&wb, "B4").as_deref(), Some("10 Purr-fect Cat Facts!"));
    assert!(!dir.path().join("temp_C2.txt").exists());
    assert!(String::from_utf8_lossy(&out.stdout).contains("10 Purr-fect Cat Facts!"));
}

#[test]
fn run_stops_when_operator_declines() {
    let dir = tempfile::tempdir().unwrap();
    let wb = workbook(dir.path(), &[("C2", "first topic"), ("C3", "second topic")]);

    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path(PATH);
        then.status(200).json_body(completion("generated"));
    });
    let config = settings(dir.path(), &wb, &server.url(PATH));

    let mut cmd = cellscribe(dir.path());
    cmd.env("OPENROUTER_API_KEY", "sk-cli").args(["run", "--config"]).arg(&config);
    let out = run_with_stdin(cmd, "n\n");

    assert_eq!(out.status.code(), Some(0));
    mock.assert_calls(1);
    assert_eq!(read(&wb, "B4").as_deref(), Some("generated"));
    assert_eq!(read(&wb, "B6"), None);
    assert!(String::from_utf8_lossy(&out.stdout).contains("Press 'Y' to continue"));
}

#[test]
fn key_from_dotenv_in_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    let wb = workbook(dir.path(), &[("C3", "a description topic")]);
    std::fs::write(dir.path().join(".env"), "OPENROUTER_API_KEY=sk-dotenv\n").unwrap();

    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path(PATH).header("authorization", "Bearer sk-dotenv");
        then.status(200).json_body(completion("A description"));
    });
    let config = settings(dir.path(), &wb, &server.url(PATH));

    let out = cellscribe(dir.path()).args(["auto", "--config"]).arg(&config).output().unwrap();

    assert_eq!(out.status.code(), Some(0));
    mock.assert_calls(1);
    assert_eq!(read(&wb, "B6").as_deref(), Some("A description"));
}

#[test]
fn config_prints_effective_settings() {
    let dir = tempfile::tempdir().unwrap();
    let wb = dir.path().join("book.xlsx");
    let config = settings(dir.path(), &wb, "http://localhost/x");

    let out = cellscribe(dir.path()).args(["config", "--config"]).arg(&config).output().unwrap();
    assert_eq!(out.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("endpoint = \"http://localhost/x\""));
    assert!(stdout.contains("[[steps]]"));
    assert!(stdout.contains("ShortHindi_AT"));
}
