use http::Method;
use may_minihttp::Request;
use std::io::{self, Cursor, Read};
use std::sync::Arc;
use tracing::{debug, info};

use crate::binding::IncomingRequest;
use crate::router::{HeaderVec, ParamVec};

/// An inbound request as the app pipeline sees it.
///
/// Built from a `may_minihttp::Request` by [`parse_request`], or directly with the
/// builder methods (handy in tests). Route values are filled in once the router matched.
#[derive(Debug, Clone)]
pub struct ParsedRequest {
    pub method: Method,
    /// Path without the query string.
    pub path: String,
    /// Decoded query pairs in order; repeated keys stay repeated.
    pub query: Vec<(String, String)>,
    /// Lowercased header names.
    pub headers: HeaderVec,
    pub route_values: ParamVec,
    body: Cursor<Vec<u8>>,
}

impl ParsedRequest {
    /// `target` is the request target, optionally with a query string.
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = split_target(target);
        Self {
            method,
            path,
            query,
            headers: HeaderVec::new(),
            route_values: ParamVec::new(),
            body: Cursor::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .push((Arc::from(name.to_ascii_lowercase()), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Cursor::new(body.into());
        self
    }

    /// First value of a header, ASCII case-insensitive.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn body_len(&self) -> usize {
        self.body.get_ref().len()
    }
}

impl IncomingRequest for ParsedRequest {
    fn route_value(&self, name: &str) -> Option<&str> {
        self.route_values
            .iter()
            .rfind(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn query_values(&self, name: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    fn read_body(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.body.read(buf)
    }
}

/// Split a request target into path and decoded query pairs.
pub fn split_target(target: &str) -> (String, Vec<(String, String)>) {
    match target.split_once('?') {
        Some((path, query)) => (path.to_string(), parse_query_params(query)),
        None => (target.to_string(), Vec::new()),
    }
}

/// Decode a raw query string (without the leading `?`).
pub fn parse_query_params(query: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Whether the headers announce a request body: a non-zero `content-length` or any
/// `transfer-encoding`.
#[must_use]
pub fn announces_body(headers: &HeaderVec) -> bool {
    headers.iter().any(|(name, value)| {
        if name.eq_ignore_ascii_case("transfer-encoding") {
            return true;
        }
        name.eq_ignore_ascii_case("content-length")
            && !matches!(value.trim().parse::<u64>(), Ok(0))
    })
}

/// Extract a [`ParsedRequest`] from a `may_minihttp::Request`.
///
/// The body is buffered whole, and only when the headers announce one. Form size limits
/// are enforced afterwards by the materializer.
///
/// # Errors
///
/// An unknown method token or a failed body read.
pub fn parse_request(req: Request) -> io::Result<ParsedRequest> {
    let method = Method::from_bytes(req.method().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let (path, query) = split_target(req.path());

    let headers: HeaderVec = req
        .headers()
        .iter()
        .map(|h| {
            (
                Arc::from(h.name.to_ascii_lowercase()),
                String::from_utf8_lossy(h.value).into_owned(),
            )
        })
        .collect();
    debug!(
        header_count = headers.len(),
        param_count = query.len(),
        "Headers and query extracted"
    );

    let mut body = Vec::new();
    if announces_body(&headers) {
        req.body().read_to_end(&mut body)?;
    }

    info!(
        method = %method,
        path = %path,
        body_bytes = body.len(),
        "HTTP request parsed"
    );

    Ok(ParsedRequest {
        method,
        path,
        query,
        headers,
        route_values: ParamVec::new(),
        body: Cursor::new(body),
    })
}
