//! # Server Module
//!
//! Host adapter onto `may_minihttp`: [`parse_request`] turns the wire request into a
//! [`ParsedRequest`], [`AppService`] runs it through a
//! [`RouteBindApp`](crate::app::RouteBindApp), and [`write_handler_response`] writes the
//! result back. [`HttpServer`] starts the listener.

pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{announces_body, parse_query_params, parse_request, split_target, ParsedRequest};
pub use response::{write_handler_response, write_json_error};
pub use service::{health_endpoint, AppService};
