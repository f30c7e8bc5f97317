//! # OpenAPI Module
//!
//! Produces an OpenAPI 3.0.1 JSON document from the endpoint request types of an
//! [`EndpointModule`](crate::app::EndpointModule).
//!
//! ## Overview
//!
//! - One path item per rendered route template, keyed by the first declared method.
//!   Routes that answer any method, and `CONNECT` routes, are left out.
//! - Route, query and header fields become parameters.
//! - Form fields (and uploaded files) become a `multipart/form-data` and
//!   `application/x-www-form-urlencoded` request body. A JSON body field is only used when
//!   there are no form fields.
//! - Body and response types become component schemas, built once per type.
//! - Summaries, remarks and examples come from a [`DocumentationSource`].
//!
//! ```rust,ignore
//! let generator = OpenApiGenerator::new(module, SchemaGeneratorOptions::new().add_default_bearer_scheme())
//!     .with_documentation(Arc::new(XmlDocumentation::for_module("docs", "sample_project")));
//! let json: &str = generator.document();
//! ```
//!
//! The serialized document is generated on first request and reused afterwards.

mod docs;
mod generator;
mod options;

pub use docs::{
    field_key, type_key, DocSection, DocumentationSource, NoDocumentation, StaticDocumentation,
    XmlDocumentation,
};
pub use generator::{OpenApiGenerator, OPENAPI_VERSION};
pub use options::{DocumentInfo, GroupNaming, SchemaGeneratorOptions};
