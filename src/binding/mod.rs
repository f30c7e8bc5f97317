//! # Model Binding
//!
//! Turns an incoming request into a populated endpoint request type.
//!
//! ## Overview
//!
//! 1. **Source resolution** ([`resolve_binding_source`]): every field is bound from the
//!    route, query string, headers, form or body, either as declared or inferred from the
//!    route template parameter names.
//! 2. **Plan building** ([`PlanBuilder`]): each bound field gets a parser from the
//!    [`ParserRegistry`] and a writer; body, file and ambient fields are classified.
//!    Unsupported field types fail here, not per request.
//! 3. **Caching** ([`PlanCache`]): plans are built once per type and shared.
//! 4. **Materialization** ([`Materializer`]): a cached plan is applied to an
//!    [`IncomingRequest`] to produce the typed value.
//!
//! Malformed scalar values leave their field at its default. Malformed JSON bodies and
//! malformed form bodies fail the request with a [`BindingError`].

mod cache;
mod error;
mod form;
mod materialize;
mod parser;
mod plan;
mod setter;
mod source;

pub use cache::PlanCache;
pub use error::BindingError;
pub use form::{
    is_form_content_type, is_json_content_type, media_type, parse_form, parse_urlencoded,
    FormData, FormError, FormLimits, UploadedFile, UploadedFiles, DEFAULT_MAX_FILE_SIZE,
    DEFAULT_MAX_PARTS, DEFAULT_MAX_TOTAL_SIZE,
};
pub use materialize::{IncomingRequest, Materializer, BODY_CHUNK_SIZE};
pub use parser::{ParserRegistry, ValueParser};
pub use plan::{AmbientFields, BindingOptions, BindingPlan, PlanBuilder};
pub use setter::{BodyField, FieldSetter, ValueSlot};
pub use source::{resolve_binding_source, BindFrom, BindingSource, ResolvedSource};
