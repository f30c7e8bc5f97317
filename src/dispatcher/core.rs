//! Dispatcher core: handler coroutines, envelopes and the `send` path.

use may::coroutine;
use may::sync::mpsc;
use serde::Serialize;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::context::{AbortSignal, RequestId};
use crate::descriptor::EndpointRequest;
use crate::router::HeaderVec;

/// Default coroutine stack size for handler workers (64KB).
pub const DEFAULT_STACK_SIZE: usize = 0x10000;

/// Response produced by a handler, a filter or the pipeline itself.
#[derive(Debug, Clone, Serialize)]
pub struct HandlerResponse {
    pub status: u16,
    #[serde(skip_serializing)]
    pub headers: HeaderVec,
    /// `Value::String` is written verbatim; `Value::Null` writes no body.
    pub body: Value,
}

impl HandlerResponse {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// JSON response with a `content-type` header.
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        Self {
            status,
            headers,
            body,
        }
    }

    /// Response with no body.
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self::new(status, HeaderVec::new(), Value::Null)
    }

    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, serde_json::json!({ "error": message }))
    }

    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header (case-insensitive name match).
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }
}

/// JSON body wrapper for handler results: always `200 OK`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Json<T>(pub T);

/// Conversion from a handler's return value into a [`HandlerResponse`].
///
/// | Result | Response |
/// |--------|----------|
/// | `HandlerResponse` | as-is |
/// | `Json<T>`, `serde_json::Value` | `200` with the serialized value |
/// | `Option<R>` | `None`: `204`, `Some(r)`: `r` |
/// | `()` | `204` |
/// | `anyhow::Result<R>` | `Ok(r)`: `r`, `Err(e)`: `500` |
pub trait IntoHandlerResponse {
    fn into_handler_response(self) -> HandlerResponse;
}

impl IntoHandlerResponse for HandlerResponse {
    fn into_handler_response(self) -> HandlerResponse {
        self
    }
}

impl<T: Serialize> IntoHandlerResponse for Json<T> {
    fn into_handler_response(self) -> HandlerResponse {
        match serde_json::to_value(self.0) {
            Ok(body) => HandlerResponse::json(200, body),
            Err(e) => {
                error!(error = %e, "Failed to serialize handler result");
                HandlerResponse::error(500, "Failed to serialize response")
            }
        }
    }
}

impl IntoHandlerResponse for Value {
    fn into_handler_response(self) -> HandlerResponse {
        HandlerResponse::json(200, self)
    }
}

impl IntoHandlerResponse for () {
    fn into_handler_response(self) -> HandlerResponse {
        HandlerResponse::empty(204)
    }
}

impl<R: IntoHandlerResponse> IntoHandlerResponse for Option<R> {
    fn into_handler_response(self) -> HandlerResponse {
        match self {
            Some(inner) => inner.into_handler_response(),
            None => HandlerResponse::empty(204),
        }
    }
}

impl<R: IntoHandlerResponse> IntoHandlerResponse for anyhow::Result<R> {
    fn into_handler_response(self) -> HandlerResponse {
        match self {
            Ok(inner) => inner.into_handler_response(),
            Err(e) => {
                error!(error = %e, "Handler returned an error");
                HandlerResponse::json(
                    500,
                    serde_json::json!({ "error": "Internal Server Error", "message": e.to_string() }),
                )
            }
        }
    }
}

/// Handles one endpoint request type.
pub trait Handler: Send + 'static {
    type Request: EndpointRequest;
    type Response: IntoHandlerResponse;

    /// Handle a bound request. `signal` flips when the client goes away.
    fn handle(&self, request: Self::Request, signal: &AbortSignal) -> Self::Response;
}

/// A request in flight to a handler coroutine.
pub struct Envelope {
    pub request_id: RequestId,
    pub type_name: &'static str,
    pub payload: Box<dyn Any + Send>,
    pub signal: AbortSignal,
    pub reply_tx: mpsc::Sender<HandlerResponse>,
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("request_id", &self.request_id)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Channel into a handler coroutine.
pub type HandlerSender = mpsc::Sender<Envelope>;

/// Why a request did not reach (or come back from) its handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No handler registered for the request type.
    NoHandler { type_name: &'static str },
    /// The request was aborted before it was sent.
    Cancelled,
    /// The handler coroutine is gone.
    Disconnected { type_name: &'static str },
}

impl DispatchError {
    /// Status written to the client.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            DispatchError::NoHandler { .. } => 500,
            DispatchError::Cancelled => 499,
            DispatchError::Disconnected { .. } => 503,
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::NoHandler { type_name } => {
                write!(f, "No handler registered for '{type_name}'")
            }
            DispatchError::Cancelled => write!(f, "Request cancelled before dispatch"),
            DispatchError::Disconnected { type_name } => {
                write!(f, "Handler for '{type_name}' is not responding")
            }
        }
    }
}

impl std::error::Error for DispatchError {}

/// The mediator: routes bound request values to their handler coroutines by type.
#[derive(Clone)]
pub struct Dispatcher {
    handlers: HashMap<TypeId, HandlerSender>,
    stack_size: usize,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handlers", &self.handlers.len())
            .field("stack_size", &self.stack_size)
            .finish()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::with_stack_size(DEFAULT_STACK_SIZE)
    }

    #[must_use]
    pub fn with_stack_size(stack_size: usize) -> Self {
        Self {
            handlers: HashMap::new(),
            stack_size,
        }
    }

    #[must_use]
    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    #[must_use]
    pub fn has_handler<R: 'static>(&self) -> bool {
        self.handlers.contains_key(&TypeId::of::<R>())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Spawn a coroutine running `handler` and route `H::Request` values to it.
    ///
    /// A handler already registered for the same request type is replaced; its channel
    /// closes and the old coroutine exits.
    ///
    /// # Safety
    ///
    /// Calls `may::coroutine::Builder::spawn`, which is unsafe in the `may` runtime. The
    /// runtime must be configured before the first registration.
    ///
    /// # Panics
    ///
    /// Handler panics are caught and answered with a `500`.
    pub unsafe fn register_handler<H: Handler>(&mut self, handler: H) {
        let (tx, rx) = mpsc::channel::<Envelope>();
        let type_name = std::any::type_name::<H::Request>();
        let stack_size = self.stack_size;

        // SAFETY: see the function contract; the closure owns everything it touches.
        let spawn_result = unsafe {
            coroutine::Builder::new()
                .stack_size(stack_size)
                .spawn(move || {
                    debug!(
                        type_name = type_name,
                        stack_size = stack_size,
                        "Handler coroutine start"
                    );
                    for envelope in rx.iter() {
                        let Envelope {
                            request_id,
                            payload,
                            signal,
                            reply_tx,
                            ..
                        } = envelope;

                        let Ok(request) = payload.downcast::<H::Request>() else {
                            error!(
                                request_id = %request_id,
                                type_name = type_name,
                                "Envelope payload has the wrong type"
                            );
                            let _ = reply_tx.send(HandlerResponse::error(500, "Mismatched request type"));
                            continue;
                        };

                        let start = Instant::now();
                        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                            handler.handle(*request, &signal).into_handler_response()
                        }));
                        let response = match outcome {
                            Ok(response) => {
                                info!(
                                    request_id = %request_id,
                                    type_name = type_name,
                                    status = response.status,
                                    execution_time_ms = start.elapsed().as_millis() as u64,
                                    "Handler execution complete"
                                );
                                response
                            }
                            Err(panic) => {
                                let panic_message = panic
                                    .downcast_ref::<&str>()
                                    .map(|s| (*s).to_string())
                                    .or_else(|| panic.downcast_ref::<String>().cloned())
                                    .unwrap_or_else(|| "unknown panic".to_string());
                                error!(
                                    request_id = %request_id,
                                    type_name = type_name,
                                    panic_message = %panic_message,
                                    "Handler panicked"
                                );
                                HandlerResponse::error(500, &format!("Handler panicked: {panic_message}"))
                            }
                        };
                        let _ = reply_tx.send(response);
                    }
                    debug!(type_name = type_name, "Handler coroutine exit");
                })
        };

        if let Err(e) = spawn_result {
            error!(
                type_name = type_name,
                error = %e,
                stack_size = stack_size,
                "Failed to spawn handler coroutine"
            );
            return;
        }

        if self.handlers.insert(TypeId::of::<H::Request>(), tx).is_some() {
            warn!(type_name = type_name, "Replaced existing handler");
        }
        info!(
            type_name = type_name,
            total_handlers = self.handlers.len(),
            "Handler registered"
        );
    }

    /// Send a bound request to its handler and wait for the response.
    ///
    /// # Errors
    ///
    /// See [`DispatchError`].
    pub fn send<R: EndpointRequest>(
        &self,
        request: R,
        signal: &AbortSignal,
        request_id: RequestId,
    ) -> Result<HandlerResponse, DispatchError> {
        self.send_erased(
            TypeId::of::<R>(),
            std::any::type_name::<R>(),
            Box::new(request),
            signal,
            request_id,
        )
    }

    /// [`Dispatcher::send`] for a request value whose type is only known by id.
    ///
    /// # Errors
    ///
    /// See [`DispatchError`].
    pub fn send_erased(
        &self,
        type_id: TypeId,
        type_name: &'static str,
        payload: Box<dyn Any + Send>,
        signal: &AbortSignal,
        request_id: RequestId,
    ) -> Result<HandlerResponse, DispatchError> {
        let Some(tx) = self.handlers.get(&type_id) else {
            error!(
                request_id = %request_id,
                type_name = type_name,
                available_handlers = self.handlers.len(),
                "Handler not found"
            );
            return Err(DispatchError::NoHandler { type_name });
        };

        if signal.is_aborted() {
            debug!(request_id = %request_id, type_name = type_name, "Request aborted before dispatch");
            return Err(DispatchError::Cancelled);
        }

        let (reply_tx, reply_rx) = mpsc::channel();
        let envelope = Envelope {
            request_id,
            type_name,
            payload,
            signal: signal.clone(),
            reply_tx,
        };

        info!(request_id = %request_id, type_name = type_name, "Request dispatched to handler");
        let start = Instant::now();
        if let Err(e) = tx.send(envelope) {
            error!(
                request_id = %request_id,
                type_name = type_name,
                error = %e,
                "Failed to send request to handler"
            );
            return Err(DispatchError::Disconnected { type_name });
        }

        match reply_rx.recv() {
            Ok(response) => {
                debug!(
                    request_id = %request_id,
                    type_name = type_name,
                    latency_ms = start.elapsed().as_millis() as u64,
                    status = response.status,
                    "Handler response received"
                );
                Ok(response)
            }
            Err(e) => {
                error!(
                    request_id = %request_id,
                    type_name = type_name,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    error = %e,
                    "Handler channel closed"
                );
                Err(DispatchError::Disconnected { type_name })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::RequestDescriptor;
    use crate::route::RouteTemplate;

    #[derive(Default)]
    struct Add {
        a: i32,
        b: i32,
    }

    impl EndpointRequest for Add {
        fn descriptor() -> RequestDescriptor<Self> {
            RequestDescriptor::<Self>::new()
                .route(RouteTemplate::get("/add"))
                .field("a", |r| &mut r.a)
                .field("b", |r| &mut r.b)
        }
    }

    struct AddHandler;

    impl Handler for AddHandler {
        type Request = Add;
        type Response = Json<i32>;

        fn handle(&self, request: Add, _signal: &AbortSignal) -> Json<i32> {
            Json(request.a + request.b)
        }
    }

    #[derive(Default)]
    struct Boom;

    impl EndpointRequest for Boom {
        fn descriptor() -> RequestDescriptor<Self> {
            RequestDescriptor::new().route(RouteTemplate::get("/boom"))
        }
    }

    struct BoomHandler;

    impl Handler for BoomHandler {
        type Request = Boom;
        type Response = ();

        fn handle(&self, _request: Boom, _signal: &AbortSignal) {
            panic!("boom");
        }
    }

    #[test]
    fn test_send_reaches_handler() {
        let mut dispatcher = Dispatcher::new();
        unsafe { dispatcher.register_handler(AddHandler) };
        let response = dispatcher
            .send(Add { a: 2, b: 3 }, &AbortSignal::new(), RequestId::new())
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, serde_json::json!(5));
        assert_eq!(response.get_header("Content-Type"), Some("application/json"));
    }

    #[test]
    fn test_missing_handler() {
        let dispatcher = Dispatcher::new();
        let err = dispatcher
            .send(Add::default(), &AbortSignal::new(), RequestId::new())
            .unwrap_err();
        assert!(matches!(err, DispatchError::NoHandler { .. }));
        assert_eq!(err.status(), 500);
    }

    #[test]
    fn test_aborted_request_is_not_sent() {
        let mut dispatcher = Dispatcher::new();
        unsafe { dispatcher.register_handler(AddHandler) };
        let signal = AbortSignal::new();
        signal.abort();
        let err = dispatcher.send(Add::default(), &signal, RequestId::new()).unwrap_err();
        assert_eq!(err, DispatchError::Cancelled);
    }

    #[test]
    fn test_panic_becomes_500() {
        let mut dispatcher = Dispatcher::new();
        unsafe { dispatcher.register_handler(BoomHandler) };
        let response = dispatcher
            .send(Boom, &AbortSignal::new(), RequestId::new())
            .unwrap();
        assert_eq!(response.status, 500);
        assert!(response.body["error"].as_str().unwrap().contains("boom"));
    }

    #[test]
    fn test_result_mapping() {
        assert_eq!(().into_handler_response().status, 204);
        assert_eq!(None::<Json<i32>>.into_handler_response().status, 204);
        assert_eq!(Some(Json("x")).into_handler_response().status, 200);
        let failed: anyhow::Result<Json<i32>> = Err(anyhow::anyhow!("db down"));
        let response = failed.into_handler_response();
        assert_eq!(response.status, 500);
        assert_eq!(response.body["message"], "db down");
    }

    #[test]
    fn test_set_header_replaces() {
        let mut response = HandlerResponse::json(200, Value::Null);
        response.set_header("Content-Type", "text/plain".to_string());
        assert_eq!(response.headers.len(), 1);
        assert_eq!(response.get_header("content-type"), Some("text/plain"));
    }
}
