//! Filter chain primitives.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::context::{HttpContext, RequestHead, ResponseHandle};
use crate::dispatcher::HandlerResponse;

/// State visible to filters while a request passes through the chain.
pub struct FilterContext {
    http: HttpContext,
    endpoint: &'static str,
    request: Option<Box<dyn Any + Send>>,
}

impl fmt::Debug for FilterContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterContext")
            .field("request_id", &self.http.request_id())
            .field("endpoint", &self.endpoint)
            .field("bound", &self.request.is_some())
            .finish()
    }
}

impl FilterContext {
    /// `request` is the bound endpoint request value; `endpoint` its type name.
    #[must_use]
    pub fn new(http: HttpContext, endpoint: &'static str, request: Box<dyn Any + Send>) -> Self {
        Self {
            http,
            endpoint,
            request: Some(request),
        }
    }

    pub fn http(&self) -> &HttpContext {
        &self.http
    }

    pub fn request_head(&self) -> &RequestHead {
        self.http.request()
    }

    pub fn response(&self) -> &ResponseHandle {
        self.http.response()
    }

    /// Type name of the endpoint request being handled.
    pub fn endpoint(&self) -> &'static str {
        self.endpoint
    }

    /// The bound request, if it is a `T` and has not been taken yet.
    pub fn request<T: 'static>(&self) -> Option<&T> {
        self.request.as_ref().and_then(|r| r.downcast_ref::<T>())
    }

    pub fn request_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.request.as_mut().and_then(|r| r.downcast_mut::<T>())
    }

    /// Remove the bound request; the endpoint does this once the chain reaches it.
    pub fn take_request(&mut self) -> Option<Box<dyn Any + Send>> {
        self.request.take()
    }
}

/// A step around endpoint execution.
///
/// Filters run in declaration order. Each either calls [`Next::run`] to continue the
/// chain or returns its own response to short-circuit it.
pub trait RouteFilter: Send + Sync {
    fn invoke(&self, ctx: &mut FilterContext, next: Next<'_>) -> HandlerResponse;
}

impl<F> RouteFilter for F
where
    F: Fn(&mut FilterContext, Next<'_>) -> HandlerResponse + Send + Sync,
{
    fn invoke(&self, ctx: &mut FilterContext, next: Next<'_>) -> HandlerResponse {
        self(ctx, next)
    }
}

type Terminal<'a> = Box<dyn FnOnce(&mut FilterContext) -> HandlerResponse + 'a>;

/// The rest of the chain after the current filter.
pub struct Next<'a> {
    remaining: &'a [Arc<dyn RouteFilter>],
    endpoint: Terminal<'a>,
}

impl<'a> Next<'a> {
    #[must_use]
    pub fn new(
        filters: &'a [Arc<dyn RouteFilter>],
        endpoint: impl FnOnce(&mut FilterContext) -> HandlerResponse + 'a,
    ) -> Self {
        Self {
            remaining: filters,
            endpoint: Box::new(endpoint),
        }
    }

    /// Number of filters still ahead.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    /// Continue with the next filter, or the endpoint when none are left.
    pub fn run(self, ctx: &mut FilterContext) -> HandlerResponse {
        match self.remaining.split_first() {
            Some((filter, rest)) => filter.invoke(
                ctx,
                Next {
                    remaining: rest,
                    endpoint: self.endpoint,
                },
            ),
            None => (self.endpoint)(ctx),
        }
    }
}

/// Run `filters` in order around `endpoint`.
pub fn run_chain<'a>(
    filters: &'a [Arc<dyn RouteFilter>],
    ctx: &mut FilterContext,
    endpoint: impl FnOnce(&mut FilterContext) -> HandlerResponse + 'a,
) -> HandlerResponse {
    Next::new(filters, endpoint).run(ctx)
}
