//! Tests for the `may_minihttp` adapter over a real socket
//!
//! # Test Coverage
//!
//! - `/health` is answered without touching the app
//! - A bound JSON request travels through the listener and back
//! - Request ids are echoed and binding failures reach the wire as 400
//!
//! Each test starts its own listener on a free local port and stops it afterwards.

use routebind::server::{AppService, HttpServer, ServerHandle};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

mod common;

fn start() -> ServerHandle {
    let app = common::sample_app();
    let addr: SocketAddr = {
        let probe = TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap()
    };
    let handle = HttpServer(AppService::new(app)).start(addr).unwrap();
    handle.wait_ready().unwrap();
    handle
}

/// Send one request and read the response up to `Content-Length`.
fn send(addr: SocketAddr, raw: &str) -> (u16, String, String) {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.write_all(raw.as_bytes()).unwrap();

    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some(split) = text.find("\r\n\r\n") {
            let head = &text[..split];
            let length = head
                .lines()
                .find_map(|l| {
                    let (k, v) = l.split_once(':')?;
                    k.eq_ignore_ascii_case("content-length")
                        .then(|| v.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= split + 4 + length {
                break;
            }
        }
    }

    let text = String::from_utf8_lossy(&buf).into_owned();
    let (head, body) = text.split_once("\r\n\r\n").unwrap();
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap();
    (status, head.to_string(), body.to_string())
}

#[test]
fn test_health_endpoint() {
    let server = start();
    let (status, _, body) = send(server.addr(), "GET /health HTTP/1.1\r\nHost: localhost\r\n\r\n");
    assert_eq!(status, 200);
    assert!(body.contains("\"ok\""));
    server.stop();
}

#[test]
fn test_json_round_trip_over_socket() {
    let server = start();
    let payload = r#"{"name":"Linus"}"#;
    let raw = format!(
        "POST /users HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nX-Request-Id: 01ARZ3NDEKTSV4RRFFQ69G5FAV\r\n\r\n{payload}",
        payload.len()
    );
    let (status, head, body) = send(server.addr(), &raw);
    assert_eq!(status, 201);
    assert!(head.to_ascii_lowercase().contains("x-request-id: 01arz3ndektsv4rrffq69g5fav"));
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["name"], "Linus");
    server.stop();
}

#[test]
fn test_malformed_body_is_400_on_the_wire() {
    let server = start();
    let payload = "{oops";
    let raw = format!(
        "POST /users HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{payload}",
        payload.len()
    );
    let (status, _, body) = send(server.addr(), &raw);
    assert_eq!(status, 400);
    assert!(body.contains("Bad Request"));
    server.stop();
}
