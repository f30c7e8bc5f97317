use routebind::dispatcher::HandlerResponse;
use routebind::filter::{FilterContext, Next, RouteFilter};

pub const EXAMPLE_FILTER_HEADER: &str = "x-example-filter";

/// Marks every response that passed through it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExampleFilter;

impl RouteFilter for ExampleFilter {
    fn invoke(&self, ctx: &mut FilterContext, next: Next<'_>) -> HandlerResponse {
        let mut response = next.run(ctx);
        response.set_header(EXAMPLE_FILTER_HEADER, ctx.endpoint().to_string());
        response
    }
}
