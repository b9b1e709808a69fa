//! Integration tests for the `testdeck serve` HTTP API.
//!
//! Each test starts the server as a child process on a unique port with the
//! demo seed loaded, makes HTTP requests, and verifies the responses.

use std::io::Read;
use std::net::TcpStream;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use serde_json::Value;

/// Atomic port counter to avoid port conflicts between parallel tests.
/// Base port is derived from process ID so separate test binaries don't
/// collide on the same port range.
static NEXT_PORT: AtomicU16 = AtomicU16::new(0);
static PORT_INIT: std::sync::Once = std::sync::Once::new();

fn next_port() -> u16 {
    PORT_INIT.call_once(|| {
        let base = 20000 + (std::process::id() as u16 % 20000);
        NEXT_PORT.store(base, Ordering::SeqCst);
    });
    NEXT_PORT.fetch_add(1, Ordering::SeqCst)
}

/// Kills the server when a test finishes, pass or fail.
struct Server(Child);

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

/// Helper: start `testdeck serve` with the demo seed on the given port.
fn start_server(port: u16) -> Server {
    let manifest_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    let workspace_root = manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root");

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_testdeck"));
    cmd.current_dir(workspace_root);
    cmd.env_remove("TESTDECK_PORT");
    cmd.args(["serve", "--host", "127.0.0.1", "--port"])
        .arg(port.to_string())
        .args(["--seed", "fixtures/demo-seed.json"]);
    cmd.stdout(std::process::Stdio::null());
    cmd.stderr(std::process::Stdio::null());

    let child = cmd.spawn().expect("failed to start testdeck serve");
    // Wait for server to be ready by polling the port
    for _ in 0..50 {
        if TcpStream::connect(format!("127.0.0.1:{}", port)).is_ok() {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    Server(child)
}

/// Helper: send a request and return (status, parsed JSON body).
fn http(port: u16, method: &str, path: &str, body: Option<&str>, user: Option<&str>) -> (u16, Value) {
    let mut stream = TcpStream::connect(format!("127.0.0.1:{}", port)).expect("failed to connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();

    let mut headers = String::new();
    if let Some(user) = user {
        headers.push_str(&format!("X-User-Id: {}\r\n", user));
    }
    let body = body.unwrap_or("");
    if !body.is_empty() {
        headers.push_str("Content-Type: application/json\r\n");
    }
    let request = format!(
        "{} {} HTTP/1.1\r\nHost: localhost:{}\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        method,
        path,
        port,
        headers,
        body.len(),
        body
    );
    std::io::Write::write_all(&mut stream, request.as_bytes()).expect("failed to write");

    let mut response = String::new();
    let _ = stream.read_to_string(&mut response);

    let (status, body) = parse_http_response(&response);
    let json = serde_json::from_str(&body).unwrap_or(Value::Null);
    (status, json)
}

/// Parse an HTTP response into (status_code, body).
fn parse_http_response(response: &str) -> (u16, String) {
    let parts: Vec<&str> = response.splitn(2, "\r\n\r\n").collect();
    let headers = parts.first().unwrap_or(&"");
    let body = parts.get(1).unwrap_or(&"").to_string();

    let status = headers
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(0);

    let body = if headers.to_ascii_lowercase().contains("transfer-encoding: chunked") {
        decode_chunked(&body)
    } else {
        body
    };
    (status, body)
}

/// Decode chunked transfer encoding.
fn decode_chunked(data: &str) -> String {
    let mut result = String::new();
    let mut remaining = data;

    while let Some(line_end) = remaining.find("\r\n") {
        let size = match usize::from_str_radix(remaining[..line_end].trim(), 16) {
            Ok(s) => s,
            Err(_) => break,
        };
        if size == 0 {
            break;
        }
        let chunk_start = line_end + 2;
        let chunk_end = (chunk_start + size).min(remaining.len());
        result.push_str(&remaining[chunk_start..chunk_end]);
        remaining = remaining.get(chunk_end + 2..).unwrap_or("");
    }

    result
}

#[test]
fn health_returns_200() {
    let port = next_port();
    let _server = start_server(port);

    let (status, body) = http(port, "GET", "/health", None, None);
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
}

#[test]
fn seeded_package_is_readable() {
    let port = next_port();
    let _server = start_server(port);

    let (status, body) = http(port, "GET", "/packages/release-1", None, None);
    assert_eq!(status, 200);
    assert_eq!(body["status"], "CREATED");
    assert_eq!(body["scenarios"].as_array().map(Vec::len), Some(2));
}

#[test]
fn blocking_every_step_blocks_scenario_then_package() {
    let port = next_port();
    let _server = start_server(port);
    let blocked = r#"{"status":"BLOCKED"}"#;

    for step in ["checkout-1", "checkout-2", "checkout-3"] {
        let (status, _) = http(
            port,
            "PUT",
            &format!("/steps/{}/status", step),
            Some(blocked),
            Some("ana"),
        );
        assert_eq!(status, 200);
    }
    let (_, checkout) = http(port, "GET", "/scenarios/checkout", None, None);
    assert_eq!(checkout["status"], "BLOCKED");
    let (_, package) = http(port, "GET", "/packages/release-1", None, None);
    assert_eq!(package["status"], "CREATED");

    let (_, outcome) = http(port, "PUT", "/steps/search-1/status", Some(blocked), Some("ben"));
    assert_eq!(outcome["propagation"]["package"]["to"], "BLOCKED");

    let (_, outcome) = http(
        port,
        "PUT",
        "/steps/checkout-2/status",
        Some(r#"{"status":"PASSED","actualResult":"paid"}"#),
        Some("ana"),
    );
    assert_eq!(outcome["id"], "checkout-2");
    assert_eq!(outcome["status"], "PASSED");
    assert_eq!(outcome["actualResult"], "paid");
    assert_eq!(outcome["propagation"]["scenario"]["to"], "EXECUTED");
    assert_eq!(outcome["propagation"]["package"]["to"], "IN_PROGRESS");
}

#[test]
fn bug_creation_returns_201_and_records_history() {
    let port = next_port();
    let _server = start_server(port);

    let (status, bug) = http(
        port,
        "POST",
        "/scenarios/signup/bugs",
        Some(r#"{"title":"Confirmation email missing","severity":"HIGH"}"#),
        Some("ben"),
    );
    assert_eq!(status, 201);

    let (_, history) = http(port, "GET", "/scenarios/signup/history", None, None);
    let entry = &history["history"][0];
    assert_eq!(entry["action"], "BUG_CREATED");
    assert_eq!(entry["metadata"]["bugId"], bug["id"]);
    assert_eq!(entry["userName"], "Ben Ito");

    let (_, scenario) = http(port, "GET", "/scenarios/signup", None, None);
    assert_eq!(scenario["status"], "FAILED");
}

#[test]
fn errors_use_json_bodies() {
    let port = next_port();
    let _server = start_server(port);

    let (status, body) = http(port, "PUT", "/steps/nope/status", Some(r#"{"status":"PASSED"}"#), None);
    assert_eq!(status, 404);
    assert!(body["error"].as_str().is_some());

    let (status, body) = http(port, "PUT", "/steps/checkout-1/status", Some(r#"{"status":"DONE"}"#), None);
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("step status"));
}
