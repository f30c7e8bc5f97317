//! # Descriptors
//!
//! Compile-time replacements for runtime type inspection. An endpoint request type
//! describes itself once through [`EndpointRequest::descriptor`]; the binder and the
//! OpenAPI generator only ever look at that description.
//!
//! - [`types`]: [`TypeInfo`] and the [`Bindable`] trait implemented by field types
//! - [`schema`]: [`ApiSchema`] for JSON body and response types
//! - [`request`]: [`RequestDescriptor`] builder and the type-erased [`EndpointMetadata`]
//!
//! The derive macros in `routebind_macros` generate all three from attributes.

pub mod request;
pub mod schema;
pub mod types;

pub use request::{
    EndpointMetadata, EndpointRequest, FieldMeta, FieldWriter, RequestDescriptor, ResponseType,
};
pub use schema::{enum_schema, object_ref, ApiSchema, ObjectRef, ObjectSchema, PropertySchema, SchemaField};
pub use types::{
    AmbientKind, Bindable, EnumMembers, JsonReader, ParsedValue, RawParser, SchemaType, TryParse,
    TypeInfo, TypeShape,
};
