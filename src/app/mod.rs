//! # App Module
//!
//! Ties the pieces together: an [`EndpointModule`] lists the endpoint request types,
//! [`RouteBindApp`] maps them onto the router, owns the plan cache and the dispatcher,
//! and runs each request through bind, filters and dispatch.
//!
//! ```rust,ignore
//! let module = EndpointModule::new("sample_project")
//!     .endpoint::<SampleGetRequest>()
//!     .endpoint::<CreateUserRequest>();
//!
//! let mut app = RouteBindApp::new(RouteBindConfig::from_env()).with_module(module);
//! app.add_filter(TracingFilter);
//! unsafe {
//!     app.register_handler(SampleGetHandler);
//!     app.register_handler(CreateUserHandler);
//! }
//! app.map_all_requests()?;
//! app.map_openapi(SchemaGeneratorOptions::new().add_default_bearer_scheme())?;
//! ```
//!
//! ## Responses produced by the pipeline itself
//!
//! | Situation | Status |
//! |-----------|--------|
//! | No route for the path | 404 |
//! | Path matches, method does not | 405 with `Allow` |
//! | Malformed JSON or form body | 400 `{"error":"Bad Request","message":...}` |
//! | Field type without a parser | 500 |
//! | Request aborted | 499, no body |
//! | No handler registered | 500 |
//! | Handler coroutine gone | 503 |

mod core;
mod module;

pub use core::{RouteBindApp, REQUEST_ID_HEADER};
pub use module::{EndpointEntry, EndpointModule};
