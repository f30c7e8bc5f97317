use std::time::Instant;

use tracing::{field, info, info_span};

use super::core::{FilterContext, Next, RouteFilter};
use crate::dispatcher::HandlerResponse;

/// Wraps the rest of the chain in a `request` span and logs the outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingFilter;

impl RouteFilter for TracingFilter {
    fn invoke(&self, ctx: &mut FilterContext, next: Next<'_>) -> HandlerResponse {
        let span = info_span!(
            "request",
            request_id = %ctx.http().request_id(),
            method = %ctx.request_head().method(),
            path = %ctx.request_head().path(),
            endpoint = ctx.endpoint(),
            status = field::Empty,
            latency_ms = field::Empty,
        );
        let start = Instant::now();
        let response = span.in_scope(|| next.run(ctx));
        let latency_ms = start.elapsed().as_millis() as u64;
        span.record("status", response.status);
        span.record("latency_ms", latency_ms);
        span.in_scope(|| {
            info!(status = response.status, latency_ms = latency_ms, "Request completed");
        });
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HttpContext;
    use crate::filter::run_chain;
    use std::sync::Arc;

    #[test]
    fn test_passes_response_through() {
        let filters: Vec<Arc<dyn RouteFilter>> = vec![Arc::new(TracingFilter)];
        let mut ctx = FilterContext::new(HttpContext::default(), "Probe", Box::new(()));
        let response = run_chain(&filters, &mut ctx, |_| HandlerResponse::empty(204));
        assert_eq!(response.status, 204);
    }
}
