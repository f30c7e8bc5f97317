//! Registration and the per-request pipeline.

use anyhow::Context as _;
use serde_json::{json, Value};
use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::module::EndpointModule;
use crate::binding::{BindingError, FormLimits, Materializer, ParserRegistry, PlanCache};
use crate::config::{ConfigError, RouteBindConfig};
use crate::context::{AbortSignal, HttpContext, RequestHead, RequestId};
use crate::descriptor::EndpointRequest;
use crate::dispatcher::{DispatchError, Dispatcher, Handler, HandlerResponse};
use crate::filter::{run_chain, FilterContext, RouteFilter};
use crate::openapi::{
    DocumentationSource, NoDocumentation, OpenApiGenerator, SchemaGeneratorOptions,
    XmlDocumentation,
};
use crate::route::RouteTemplate;
use crate::router::{HeaderVec, Router};
use crate::server::ParsedRequest;

/// Header carrying the request id in and out.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

type BoundRequest = Box<dyn Any + Send>;
type BindFn = fn(&Materializer<'_>, &mut ParsedRequest, &HttpContext) -> Result<BoundRequest, BindingError>;

fn bind_erased<T: EndpointRequest>(
    materializer: &Materializer<'_>,
    request: &mut ParsedRequest,
    context: &HttpContext,
) -> Result<BoundRequest, BindingError> {
    materializer
        .materialize::<T, ParsedRequest>(request, context)
        .map(|value| Box::new(value) as BoundRequest)
}

struct RequestEndpoint {
    type_id: TypeId,
    type_name: &'static str,
    filters: Vec<Arc<dyn RouteFilter>>,
    bind: BindFn,
}

enum Endpoint {
    Request(RequestEndpoint),
    Document(Arc<OpenApiGenerator>),
}

/// An application: endpoint request types mapped onto routes, their handlers, and the
/// pipeline that turns a [`ParsedRequest`] into a [`HandlerResponse`].
///
/// Per matched request: build the [`HttpContext`], bind the endpoint request type, run
/// the filter chain (global filters first, then the type's own), send the bound value to
/// its handler, then merge anything the handler set through the
/// [`ResponseHandle`](crate::context::ResponseHandle).
pub struct RouteBindApp {
    config: RouteBindConfig,
    plans: PlanCache,
    limits: FormLimits,
    dispatcher: Dispatcher,
    router: Router,
    endpoints: Vec<Endpoint>,
    mapped: HashSet<TypeId>,
    global_filters: Vec<Arc<dyn RouteFilter>>,
    module: Option<EndpointModule>,
}

impl fmt::Debug for RouteBindApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteBindApp")
            .field("config", &self.config)
            .field("plans", &self.plans)
            .field("dispatcher", &self.dispatcher)
            .field("routes", &self.router.len())
            .field("endpoints", &self.endpoints.len())
            .field("global_filters", &self.global_filters.len())
            .field("module", &self.module.as_ref().map(EndpointModule::name))
            .finish()
    }
}

impl Default for RouteBindApp {
    fn default() -> Self {
        Self::new(RouteBindConfig::default())
    }
}

impl RouteBindApp {
    #[must_use]
    pub fn new(config: RouteBindConfig) -> Self {
        let plans = PlanCache::new(ParserRegistry::with_defaults(), config.binding_options());
        let dispatcher = Dispatcher::with_stack_size(config.handler_stack_size);
        Self {
            config,
            plans,
            limits: FormLimits::default(),
            dispatcher,
            router: Router::new(),
            endpoints: Vec::new(),
            mapped: HashSet::new(),
            global_filters: Vec::new(),
            module: None,
        }
    }

    /// Replace the parser registry. Plans already built keep the parsers they had.
    #[must_use]
    pub fn with_parsers(mut self, parsers: ParserRegistry) -> Self {
        self.plans = PlanCache::new(parsers, self.config.binding_options());
        self
    }

    #[must_use]
    pub fn with_form_limits(mut self, limits: FormLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn with_module(mut self, module: EndpointModule) -> Self {
        self.module = Some(module);
        self
    }

    /// Add a filter that runs for every endpoint, ahead of the endpoint's own filters.
    pub fn add_filter(&mut self, filter: impl RouteFilter + 'static) {
        self.global_filters.push(Arc::new(filter));
    }

    /// Register the handler for `H::Request`.
    ///
    /// # Safety
    ///
    /// Spawns a `may` coroutine; see [`Dispatcher::register_handler`].
    #[allow(unsafe_code)]
    pub unsafe fn register_handler<H: Handler>(&mut self, handler: H) {
        self.dispatcher.register_handler(handler);
    }

    #[must_use]
    pub fn config(&self) -> &RouteBindConfig {
        &self.config
    }

    #[must_use]
    pub fn plans(&self) -> &PlanCache {
        &self.plans
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    #[must_use]
    pub fn module(&self) -> Option<&EndpointModule> {
        self.module.as_ref()
    }

    /// Route every template of `T` to the binding pipeline.
    ///
    /// Mapping a type twice is a no-op. With `build_plans_eagerly` the binding plan is
    /// built here, so an unsupported field type fails now instead of on first request.
    ///
    /// # Errors
    ///
    /// An unsupported field type (eager plans only) or a template that does not compile.
    pub fn map_request<T: EndpointRequest>(&mut self) -> anyhow::Result<()> {
        let type_id = TypeId::of::<T>();
        let type_name = std::any::type_name::<T>();
        if self.mapped.contains(&type_id) {
            debug!(type_name = type_name, "Endpoint already mapped");
            return Ok(());
        }

        let (metadata, _, filters) = T::descriptor().into_parts();
        if self.config.build_plans_eagerly {
            self.plans
                .get_or_build::<T>()
                .with_context(|| format!("Failed to build binding plan for '{type_name}'"))?;
        }
        if metadata.routes.is_empty() {
            warn!(type_name = type_name, "Endpoint declares no routes");
        }

        let index = self.endpoints.len();
        for route in &metadata.routes {
            self.router
                .add(route, index)
                .with_context(|| format!("Invalid route template '{}' on '{type_name}'", route.template))?;
        }
        self.endpoints.push(Endpoint::Request(RequestEndpoint {
            type_id,
            type_name,
            filters,
            bind: bind_erased::<T>,
        }));
        self.mapped.insert(type_id);
        info!(
            type_name = type_name,
            routes = metadata.routes.len(),
            eager_plan = self.config.build_plans_eagerly,
            "Endpoint mapped"
        );
        Ok(())
    }

    /// Map every type of the configured module.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingModule`] without a module, otherwise see
    /// [`RouteBindApp::map_request`].
    pub fn map_all_requests(&mut self) -> anyhow::Result<()> {
        let module = self.module.clone().ok_or(ConfigError::MissingModule)?;
        for entry in module.entries() {
            entry.map_into(self)?;
        }
        info!(module = module.name(), endpoints = module.len(), "Module mapped");
        Ok(())
    }

    /// Serve the module's OpenAPI document on `GET <openapi_path>`.
    ///
    /// Documentation is read from `<docs_dir>/<module>.xml` when `docs_dir` is configured.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingModule`] without a module.
    pub fn map_openapi(
        &mut self,
        options: SchemaGeneratorOptions,
    ) -> anyhow::Result<Arc<OpenApiGenerator>> {
        let module = self.module.clone().ok_or(ConfigError::MissingModule)?;
        let docs: Arc<dyn DocumentationSource> = match &self.config.docs_dir {
            Some(dir) => Arc::new(XmlDocumentation::for_module(dir, module.name())),
            None => Arc::new(NoDocumentation),
        };
        let generator = OpenApiGenerator::new(module, options)
            .with_documentation(docs)
            .with_binding_options(self.config.binding_options());
        self.map_document(generator)
    }

    /// Serve an already configured generator on `GET <openapi_path>`.
    ///
    /// # Errors
    ///
    /// The configured path is not a valid template.
    pub fn map_document(&mut self, generator: OpenApiGenerator) -> anyhow::Result<Arc<OpenApiGenerator>> {
        let generator = Arc::new(generator);
        let route = RouteTemplate::get(self.config.openapi_path.clone());
        self.router
            .add(&route, self.endpoints.len())
            .with_context(|| format!("Invalid OpenAPI path '{}'", route.template))?;
        self.endpoints.push(Endpoint::Document(Arc::clone(&generator)));
        info!(path = %route.template, "OpenAPI document mapped");
        Ok(generator)
    }

    /// Run one request through the pipeline.
    ///
    /// The response always carries `x-request-id`, reusing the inbound one when it is a
    /// valid ULID.
    pub fn handle(&self, request: &mut ParsedRequest, signal: AbortSignal) -> HandlerResponse {
        let request_id = RequestId::from_header_or_new(request.header(REQUEST_ID_HEADER));
        let mut response = self.execute(request, signal, request_id);
        response.set_header(REQUEST_ID_HEADER, request_id.to_string());
        response
    }

    fn execute(
        &self,
        request: &mut ParsedRequest,
        signal: AbortSignal,
        request_id: RequestId,
    ) -> HandlerResponse {
        let Some(matched) = self.router.route(&request.method, &request.path) else {
            return self.unmatched(request, request_id);
        };

        request.route_values = matched.route_values.clone();
        let head = RequestHead::new(
            request.method.clone(),
            request.path.clone(),
            matched.route_values,
            request.query.clone(),
            request.headers.clone(),
        );
        let context = HttpContext::new(request_id, head, signal);

        let endpoint = match self.endpoints.get(matched.endpoint) {
            Some(Endpoint::Request(endpoint)) => endpoint,
            Some(Endpoint::Document(generator)) => return document_response(generator),
            None => {
                error!(request_id = %request_id, index = matched.endpoint, "Route points at no endpoint");
                return HandlerResponse::error(500, "Internal Server Error");
            }
        };

        let materializer = Materializer::new(&self.plans).with_limits(self.limits);
        let bound = match (endpoint.bind)(&materializer, request, &context) {
            Ok(bound) => bound,
            Err(err) => return binding_failure(&err, endpoint.type_name, request_id),
        };

        let filters: Vec<Arc<dyn RouteFilter>> = self
            .global_filters
            .iter()
            .chain(endpoint.filters.iter())
            .cloned()
            .collect();
        let mut filter_ctx = FilterContext::new(context.clone(), endpoint.type_name, bound);
        let dispatcher = &self.dispatcher;
        let (type_id, type_name) = (endpoint.type_id, endpoint.type_name);

        let mut response = run_chain(&filters, &mut filter_ctx, move |ctx| {
            let Some(payload) = ctx.take_request() else {
                error!(request_id = %request_id, type_name = type_name, "Bound request was taken by a filter");
                return HandlerResponse::error(500, "Internal Server Error");
            };
            let http = ctx.http();
            match dispatcher.send_erased(type_id, type_name, payload, http.signal(), http.request_id()) {
                Ok(response) => response,
                Err(DispatchError::Cancelled) => HandlerResponse::empty(499),
                Err(err) => HandlerResponse::json(err.status(), json!({ "error": err.to_string() })),
            }
        });

        let parts = context.response().snapshot();
        if let Some(status) = parts.status {
            response.status = status;
        }
        for (name, value) in parts.headers {
            response.set_header(&name, value);
        }
        response
    }

    fn unmatched(&self, request: &ParsedRequest, request_id: RequestId) -> HandlerResponse {
        let allowed = self.router.allowed_methods(&request.path);
        if allowed.is_empty() {
            debug!(request_id = %request_id, method = %request.method, path = %request.path, "No route matched");
            return HandlerResponse::json(
                404,
                json!({ "error": "Not Found", "method": request.method.as_str(), "path": request.path }),
            );
        }
        debug!(
            request_id = %request_id,
            method = %request.method,
            path = %request.path,
            allowed = ?allowed,
            "Method not allowed"
        );
        let mut response = HandlerResponse::json(
            405,
            json!({ "error": "Method Not Allowed", "method": request.method.as_str(), "path": request.path }),
        );
        response.set_header("allow", allowed.join(", "));
        response
    }
}

fn document_response(generator: &OpenApiGenerator) -> HandlerResponse {
    let mut headers = HeaderVec::new();
    headers.push((Arc::from("content-type"), "application/json".to_string()));
    HandlerResponse::new(200, headers, Value::String(generator.document().to_string()))
}

fn binding_failure(err: &BindingError, type_name: &'static str, request_id: RequestId) -> HandlerResponse {
    match err {
        BindingError::Cancelled => {
            debug!(request_id = %request_id, type_name = type_name, "Request aborted while binding");
            HandlerResponse::empty(499)
        }
        err if err.is_client_error() => {
            warn!(
                request_id = %request_id,
                type_name = type_name,
                error = %err,
                "Request binding failed"
            );
            HandlerResponse::json(
                400,
                json!({ "error": "Bad Request", "message": err.to_string() }),
            )
        }
        err => {
            error!(
                request_id = %request_id,
                type_name = type_name,
                error = %err,
                "Endpoint cannot be bound"
            );
            HandlerResponse::json(
                500,
                json!({ "error": "Internal Server Error", "message": err.to_string() }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindFrom;
    use crate::descriptor::{Bindable, RequestDescriptor, SchemaField, SchemaType, TypeInfo};
    use http::Method;

    #[derive(Default)]
    struct Echo {
        id: i32,
    }

    impl EndpointRequest for Echo {
        fn descriptor() -> RequestDescriptor<Self> {
            RequestDescriptor::<Self>::new()
                .route(RouteTemplate::get("/echo/{id:int}"))
                .field("id", |r| &mut r.id)
        }
    }

    #[derive(Debug, Default, serde::Deserialize)]
    struct Payload {
        #[allow(dead_code)]
        name: String,
    }

    impl SchemaField for Payload {
        fn schema_type() -> SchemaType {
            SchemaType::primitive("object", "")
        }
    }

    #[derive(Default)]
    struct Broken {
        payload: Payload,
    }

    impl EndpointRequest for Broken {
        fn descriptor() -> RequestDescriptor<Self> {
            RequestDescriptor::<Self>::new()
                .route(RouteTemplate::post("/broken"))
                .body("payload", |r| &mut r.payload)
        }
    }

    // Claims to be a scalar but has no parser.
    #[derive(Default)]
    struct Opaque;

    impl Bindable for Opaque {
        fn type_info() -> TypeInfo {
            TypeInfo::scalar::<Opaque>("string", "opaque")
        }
    }

    #[derive(Default)]
    struct Unsupported {
        value: Opaque,
    }

    impl EndpointRequest for Unsupported {
        fn descriptor() -> RequestDescriptor<Self> {
            RequestDescriptor::<Self>::new()
                .route(RouteTemplate::get("/unsupported"))
                .bind("value", BindFrom::query(), |r| &mut r.value)
        }
    }

    #[test]
    fn test_unmatched_path_is_404_with_request_id() {
        let mut app = RouteBindApp::default();
        app.map_request::<Echo>().unwrap();
        let mut request = ParsedRequest::new(Method::GET, "/nothing");
        let response = app.handle(&mut request, AbortSignal::new());
        assert_eq!(response.status, 404);
        assert!(response.get_header(REQUEST_ID_HEADER).is_some());
    }

    #[test]
    fn test_wrong_method_is_405_with_allow() {
        let mut app = RouteBindApp::default();
        app.map_request::<Echo>().unwrap();
        let mut request = ParsedRequest::new(Method::DELETE, "/echo/5");
        let response = app.handle(&mut request, AbortSignal::new());
        assert_eq!(response.status, 405);
        assert_eq!(response.get_header("allow"), Some("GET"));
    }

    #[test]
    fn test_inbound_request_id_is_echoed() {
        let app = RouteBindApp::default();
        let id = RequestId::new().to_string();
        let mut request = ParsedRequest::new(Method::GET, "/").with_header("X-Request-Id", id.clone());
        let response = app.handle(&mut request, AbortSignal::new());
        assert_eq!(response.get_header(REQUEST_ID_HEADER), Some(id.as_str()));
    }

    #[test]
    fn test_malformed_json_is_400_before_dispatch() {
        let mut app = RouteBindApp::default();
        app.map_request::<Broken>().unwrap();
        let mut request = ParsedRequest::new(Method::POST, "/broken")
            .with_header("content-type", "application/json")
            .with_body("{not json");
        let response = app.handle(&mut request, AbortSignal::new());
        assert_eq!(response.status, 400);
        assert_eq!(response.body["error"], "Bad Request");
    }

    #[test]
    fn test_missing_handler_is_500() {
        let mut app = RouteBindApp::default();
        app.map_request::<Echo>().unwrap();
        let mut request = ParsedRequest::new(Method::GET, "/echo/5");
        let response = app.handle(&mut request, AbortSignal::new());
        assert_eq!(response.status, 500);
    }

    #[test]
    fn test_aborted_request_is_499() {
        let mut app = RouteBindApp::default();
        app.map_request::<Broken>().unwrap();
        let signal = AbortSignal::new();
        signal.abort();
        let mut request = ParsedRequest::new(Method::POST, "/broken")
            .with_header("content-type", "application/json")
            .with_body("{}");
        assert_eq!(app.handle(&mut request, signal).status, 499);
    }

    #[test]
    fn test_eager_plans_fail_at_mapping() {
        let config = RouteBindConfig {
            build_plans_eagerly: true,
            ..RouteBindConfig::default()
        };
        let mut app = RouteBindApp::new(config);
        let err = app.map_request::<Unsupported>().unwrap_err();
        assert!(err.to_string().contains("Unsupported"));

        let mut lazy = RouteBindApp::default();
        lazy.map_request::<Unsupported>().unwrap();
        let mut request = ParsedRequest::new(Method::GET, "/unsupported?value=1");
        assert_eq!(lazy.handle(&mut request, AbortSignal::new()).status, 500);
    }

    #[test]
    fn test_module_is_required() {
        let mut app = RouteBindApp::default();
        let err = app.map_all_requests().unwrap_err();
        assert!(matches!(err.downcast_ref::<ConfigError>(), Some(ConfigError::MissingModule)));
        assert!(app.map_openapi(SchemaGeneratorOptions::new()).is_err());
    }

    #[test]
    fn test_document_is_served() {
        let module = EndpointModule::new("probe").endpoint::<Echo>();
        let mut app = RouteBindApp::default().with_module(module);
        app.map_all_requests().unwrap();
        app.map_openapi(SchemaGeneratorOptions::new()).unwrap();
        let mut request = ParsedRequest::new(Method::GET, "/openapi.json");
        let response = app.handle(&mut request, AbortSignal::new());
        assert_eq!(response.status, 200);
        assert_eq!(response.get_header("content-type"), Some("application/json"));
        let Value::String(text) = &response.body else {
            panic!("document body should be text");
        };
        let document: Value = serde_json::from_str(text).unwrap();
        assert!(document["paths"]["/echo/{id}"]["get"].is_object());
    }
}
