//! Sample endpoints served by routebind.
//!
//! [`build_app`] wires the module, handlers and OpenAPI document into a ready
//! [`RouteBindApp`]; `main.rs` only adds the CLI and the listener.

pub mod controllers;
pub mod filters;
pub mod models;
pub mod requests;

use routebind::app::{EndpointModule, RouteBindApp};
use routebind::config::RouteBindConfig;
use routebind::filter::TracingFilter;
use routebind::openapi::SchemaGeneratorOptions;

use controllers::{
    CreateUserController, ListUsersController, SampleGetController, UploadFileController, UserStore,
};
use requests::{CreateUserRequest, ListUsersRequest, SampleGetRequest, UploadFileRequest};

pub const MODULE_NAME: &str = "sample_project";

#[must_use]
pub fn module() -> EndpointModule {
    EndpointModule::new(MODULE_NAME)
        .endpoint::<SampleGetRequest>()
        .endpoint::<CreateUserRequest>()
        .endpoint::<ListUsersRequest>()
        .endpoint::<UploadFileRequest>()
}

#[must_use]
pub fn openapi_options() -> SchemaGeneratorOptions {
    SchemaGeneratorOptions::new()
        .with_info("Sample Project", "v1")
        .with_description("Endpoints exercising every binding source.")
        .add_default_bearer_scheme()
}

/// Register handlers and routes for every sample endpoint.
///
/// # Errors
///
/// Mapping fails (bad template, or an unsupported field type with eager plans).
pub fn build_app(config: RouteBindConfig) -> anyhow::Result<RouteBindApp> {
    let mut app = RouteBindApp::new(config).with_module(module());
    app.add_filter(TracingFilter);

    let store = UserStore::default();
    // SAFETY: handlers are registered once, before the server starts.
    #[allow(unsafe_code)]
    unsafe {
        app.register_handler(SampleGetController);
        app.register_handler(CreateUserController {
            store: store.clone(),
        });
        app.register_handler(ListUsersController { store });
        app.register_handler(UploadFileController);
    }

    app.map_all_requests()?;
    app.map_openapi(openapi_options())?;
    Ok(app)
}
