//! # Dispatcher Module
//!
//! The mediator between bound requests and the code that handles them.
//!
//! ## Overview
//!
//! Each [`Handler`] is registered for exactly one endpoint request type and runs in its
//! own `may` coroutine. [`Dispatcher::send`] looks the handler up by the request's type,
//! hands the value over a channel together with the request's [`AbortSignal`] and waits
//! for the [`HandlerResponse`].
//!
//! ```rust,ignore
//! struct GetUser;
//!
//! impl Handler for GetUser {
//!     type Request = GetUserRequest;
//!     type Response = Option<Json<User>>;
//!
//!     fn handle(&self, req: GetUserRequest, _signal: &AbortSignal) -> Option<Json<User>> {
//!         USERS.get(&req.id).cloned().map(Json)
//!     }
//! }
//!
//! unsafe { dispatcher.register_handler(GetUser) };
//! ```
//!
//! ## Error Handling
//!
//! - No handler for the type: [`DispatchError::NoHandler`] (500)
//! - Handler coroutine gone: [`DispatchError::Disconnected`] (503)
//! - Handler panics are caught in the coroutine and answered with a 500
//!
//! Handler return values become responses through [`IntoHandlerResponse`].
//!
//! [`AbortSignal`]: crate::context::AbortSignal

mod core;

pub use core::{
    DispatchError, Dispatcher, Envelope, Handler, HandlerResponse, HandlerSender,
    IntoHandlerResponse, Json, DEFAULT_STACK_SIZE,
};
