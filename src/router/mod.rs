//! # Router Module
//!
//! Matches incoming requests to the endpoint request types registered with the app.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Compiling every [`RouteTemplate`](crate::route::RouteTemplate) attached to a mapped
//!   endpoint type into an anchored regex
//! - Matching method + path to the most specific registered route
//! - Extracting and percent-decoding route values for the binder
//!
//! ## Architecture
//!
//! 1. **Compilation**: when an endpoint is mapped, each template (e.g. `/pets/{id:int}`)
//!    becomes a case-insensitive regex plus the ordered parameter names. Constraints
//!    narrow the character class of the capture.
//!
//! 2. **Matching**: per request, routes are tried in precedence order and the first
//!    whose method set and pattern both match wins.
//!
//! ## Example
//!
//! ```rust
//! use routebind::route::RouteTemplate;
//! use routebind::router::Router;
//! use http::Method;
//!
//! let mut router = Router::new();
//! router.add(&RouteTemplate::get("/pets/{id:int}"), 0).unwrap();
//!
//! let matched = router.route(&Method::GET, "/pets/42").unwrap();
//! assert_eq!(matched.route_value("id"), Some("42"));
//! assert!(router.route(&Method::GET, "/pets/abc").is_none());
//! ```

mod core;

pub use core::{HeaderVec, ParamVec, RouteMatch, Router, MAX_INLINE_HEADERS, MAX_INLINE_PARAMS};
