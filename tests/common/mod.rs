//! Shared helpers for the integration tests.

#![allow(dead_code)]

use http::Method;
use routebind::app::RouteBindApp;
use routebind::config::RouteBindConfig;
use routebind::context::AbortSignal;
use routebind::dispatcher::HandlerResponse;
use routebind::server::ParsedRequest;
use serde_json::Value;
use std::sync::Once;

static MAY_INIT: Once = Once::new();

/// Configure the `may` runtime once per test binary.
pub fn setup_may_runtime() {
    MAY_INIT.call_once(|| {
        may::config().set_stack_size(0x8000);
    });
}

/// The sample project app with eager plans.
pub fn sample_app() -> RouteBindApp {
    setup_may_runtime();
    let config = RouteBindConfig {
        build_plans_eagerly: true,
        ..RouteBindConfig::default()
    };
    sample_project::build_app(config).expect("sample app builds")
}

pub fn request(method: Method, target: &str) -> ParsedRequest {
    ParsedRequest::new(method, target)
}

pub fn json_request(method: Method, target: &str, body: &str) -> ParsedRequest {
    ParsedRequest::new(method, target)
        .with_header("content-type", "application/json")
        .with_body(body.as_bytes().to_vec())
}

pub fn handle(app: &RouteBindApp, mut request: ParsedRequest) -> HandlerResponse {
    app.handle(&mut request, AbortSignal::new())
}

/// Body of a response that was written as a serialized JSON document string.
pub fn document_body(response: &HandlerResponse) -> Value {
    match &response.body {
        Value::String(text) => serde_json::from_str(text).expect("document is JSON"),
        other => other.clone(),
    }
}

pub mod multipart {
    pub const BOUNDARY: &str = "routebind-test-boundary";

    pub fn content_type() -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    /// Multipart body from `(name, value)` fields and `(name, file_name, content_type, data)` files.
    pub fn body(fields: &[(&str, &str)], files: &[(&str, &str, &str, &[u8])]) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, value) in fields {
            out.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            out.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            );
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        for (name, file_name, content_type, data) in files {
            out.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            out.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n"
                )
                .as_bytes(),
            );
            out.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
            out.extend_from_slice(data);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        out
    }
}
