//! # routebind
//!
//! Declarative endpoint request types for a coroutine HTTP server. A request type is a
//! plain struct; it says which routes it answers and where each field comes from, and
//! routebind does the rest:
//!
//! - **binding**: fields are filled from route values, the query string, headers, form
//!   fields, uploaded files or a JSON body, with the source inferred for plain scalar
//!   fields when nothing is declared
//! - **dispatch**: the bound value is sent to the one [`Handler`] registered for its type,
//!   running in a `may` coroutine
//! - **OpenAPI**: the same declarations produce an OpenAPI 3.0.1 document
//!
//! ## Architecture
//!
//! - **[`descriptor`]** - static descriptions of request, body and field types
//! - **[`binding`]** - source resolution, parser registry, cached binding plans, materialization
//! - **[`route`]** / **[`router`]** - route templates and method + path matching
//! - **[`context`]** - per-request ambient objects and the cancellation signal
//! - **[`filter`]** - ordered filter chain around endpoint execution
//! - **[`dispatcher`]** - handler coroutines and result mapping
//! - **[`openapi`]** - document generation and side-loaded documentation
//! - **[`app`]** - registration and the request pipeline
//! - **[`server`]** - `may_minihttp` adapter
//! - **[`config`]** / **[`logging`]** - configuration and tracing setup
//!
//! ## Example
//!
//! ```rust,ignore
//! use routebind::prelude::*;
//!
//! #[derive(Debug, Default, EndpointRequest)]
//! #[endpoint(get = "/users/{id:long}")]
//! struct GetUser {
//!     id: i64,
//!     #[bind(header, name = "x-tenant")]
//!     tenant: Option<String>,
//! }
//!
//! struct GetUserHandler;
//!
//! impl Handler for GetUserHandler {
//!     type Request = GetUser;
//!     type Response = Json<serde_json::Value>;
//!
//!     fn handle(&self, req: GetUser, _signal: &AbortSignal) -> Self::Response {
//!         Json(serde_json::json!({ "id": req.id, "tenant": req.tenant }))
//!     }
//! }
//!
//! let mut app = RouteBindApp::new(RouteBindConfig::from_env())
//!     .with_module(EndpointModule::new("users").endpoint::<GetUser>());
//! unsafe { app.register_handler(GetUserHandler) };
//! app.map_all_requests()?;
//! app.map_openapi(SchemaGeneratorOptions::new())?;
//! HttpServer(AppService::new(app)).start("0.0.0.0:8080")?.join().ok();
//! ```

extern crate self as routebind;

pub mod app;
pub mod binding;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod dispatcher;
pub mod filter;
pub mod logging;
pub mod openapi;
pub mod route;
pub mod router;
pub mod server;

pub use app::{EndpointModule, RouteBindApp};
pub use binding::{BindFrom, BindingError, BindingSource, UploadedFile, UploadedFiles};
pub use config::{ConfigError, RouteBindConfig};
pub use context::{AbortSignal, HttpContext, RequestHead, RequestId, ResponseHandle};
pub use descriptor::{EndpointRequest, RequestDescriptor};
pub use dispatcher::{Handler, HandlerResponse, IntoHandlerResponse, Json};
pub use openapi::{OpenApiGenerator, SchemaGeneratorOptions};
pub use route::RouteTemplate;
pub use routebind_macros::{ApiSchema, BindableEnum, EndpointRequest};

/// The names most applications need.
pub mod prelude {
    pub use crate::app::{EndpointModule, RouteBindApp};
    pub use crate::binding::{BindFrom, UploadedFile, UploadedFiles};
    pub use crate::config::RouteBindConfig;
    pub use crate::context::{AbortSignal, HttpContext, RequestHead, ResponseHandle};
    pub use crate::descriptor::{ApiSchema, EndpointRequest};
    pub use crate::dispatcher::{Handler, HandlerResponse, Json};
    pub use crate::filter::{FilterContext, Next, RouteFilter, TracingFilter};
    pub use crate::openapi::SchemaGeneratorOptions;
    pub use crate::route::RouteTemplate;
    pub use crate::server::{AppService, HttpServer};
    pub use routebind_macros::{ApiSchema, BindableEnum, EndpointRequest};
}
