//! # Request Context
//!
//! Ambient, per-request objects that an endpoint request type may ask for instead of
//! a parsed value: the whole [`HttpContext`], the [`RequestHead`] it was built from,
//! or the [`ResponseHandle`] the handler can use to add headers or override the status.
//!
//! All three are cheap `Arc`-backed handles, so the binder can write clones of them into
//! request fields while the executing pipeline keeps its own copy.
//!
//! The [`AbortSignal`] carried by the context is the request-cancellation signal. The
//! host flips it when the client goes away; the materializer checks it while reading the
//! body and handlers receive it through the dispatcher.

use http::Method;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::descriptor::{AmbientKind, Bindable, TypeInfo};
use crate::router::{HeaderVec, ParamVec};

/// Request identifier backed by ULID.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct RequestId(pub ulid::Ulid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Reuse an inbound `x-request-id` when it is a valid ULID, otherwise mint one.
    #[must_use]
    pub fn from_header_or_new(header_value: Option<&str>) -> Self {
        header_value
            .and_then(|s| s.parse::<RequestId>().ok())
            .unwrap_or_default()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ulid::Ulid::from_string(s).map(RequestId)
    }
}

/// Cooperative cancellation flag shared between the host and everything working on
/// behalf of one request.
#[derive(Clone, Debug, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the request as aborted. Idempotent.
    pub fn abort(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Immutable view of the inbound request line, headers, query and route values.
#[derive(Clone, Debug)]
pub struct RequestHead(Arc<HeadInner>);

#[derive(Debug)]
struct HeadInner {
    method: Method,
    path: String,
    route_values: ParamVec,
    query: Vec<(String, String)>,
    headers: HeaderVec,
}

impl RequestHead {
    #[must_use]
    pub fn new(
        method: Method,
        path: impl Into<String>,
        route_values: ParamVec,
        query: Vec<(String, String)>,
        headers: HeaderVec,
    ) -> Self {
        Self(Arc::new(HeadInner {
            method,
            path: path.into(),
            route_values,
            query,
            headers,
        }))
    }

    pub fn method(&self) -> &Method {
        &self.0.method
    }

    pub fn path(&self) -> &str {
        &self.0.path
    }

    pub fn route_values(&self) -> &ParamVec {
        &self.0.route_values
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.0.query
    }

    pub fn headers(&self) -> &HeaderVec {
        &self.0.headers
    }

    /// Case-insensitive header lookup; returns the first value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.0
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Case-insensitive route value lookup.
    pub fn route_value(&self, name: &str) -> Option<&str> {
        self.0
            .route_values
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl Default for RequestHead {
    fn default() -> Self {
        Self::new(
            Method::GET,
            "/",
            ParamVec::new(),
            Vec::new(),
            HeaderVec::new(),
        )
    }
}

/// Status and headers a handler contributed through the ambient response handle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseParts {
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
}

/// Shared, mutable response contributions for one request.
#[derive(Clone, Debug, Default)]
pub struct ResponseHandle(Arc<Mutex<ResponseParts>>);

impl ResponseHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, status: u16) {
        self.lock().status = Some(status);
    }

    /// Set a header, replacing any previous value with the same (case-insensitive) name.
    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let mut parts = self.lock();
        if let Some(slot) = parts
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            slot.1 = value;
        } else {
            parts.headers.push((name, value));
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> ResponseParts {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ResponseParts> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The in-flight request as seen by binding, filters and handlers.
#[derive(Clone, Debug)]
pub struct HttpContext(Arc<ContextInner>);

#[derive(Debug)]
struct ContextInner {
    request_id: RequestId,
    request: RequestHead,
    response: ResponseHandle,
    signal: AbortSignal,
}

impl HttpContext {
    #[must_use]
    pub fn new(request_id: RequestId, request: RequestHead, signal: AbortSignal) -> Self {
        Self(Arc::new(ContextInner {
            request_id,
            request,
            response: ResponseHandle::new(),
            signal,
        }))
    }

    pub fn request_id(&self) -> RequestId {
        self.0.request_id
    }

    pub fn request(&self) -> &RequestHead {
        &self.0.request
    }

    pub fn response(&self) -> &ResponseHandle {
        &self.0.response
    }

    pub fn signal(&self) -> &AbortSignal {
        &self.0.signal
    }
}

impl Default for HttpContext {
    fn default() -> Self {
        Self::new(RequestId::new(), RequestHead::default(), AbortSignal::new())
    }
}

impl Bindable for HttpContext {
    fn type_info() -> TypeInfo {
        TypeInfo::ambient::<HttpContext>(AmbientKind::Context)
    }
}

impl Bindable for RequestHead {
    fn type_info() -> TypeInfo {
        TypeInfo::ambient::<RequestHead>(AmbientKind::Request)
    }
}

impl Bindable for ResponseHandle {
    fn type_info() -> TypeInfo {
        TypeInfo::ambient::<ResponseHandle>(AmbientKind::Response)
    }
}
