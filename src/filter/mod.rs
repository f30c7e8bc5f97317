//! # Filters
//!
//! Ordered steps around endpoint execution. A filter sees the [`FilterContext`] (the
//! request context plus the already bound request value) and decides whether to
//! continue with [`Next::run`] or answer on its own.
//!
//! Filters come from two places and run in this order:
//!
//! 1. global filters added to the app
//! 2. the endpoint request type's own filters, in declaration order
//!
//! Plain closures `Fn(&mut FilterContext, Next<'_>) -> HandlerResponse` are filters too.

mod core;
mod tracing;

pub use core::{run_chain, FilterContext, Next, RouteFilter};
pub use self::tracing::TracingFilter;
