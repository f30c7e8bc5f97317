//! Endpoint request descriptors.
//!
//! A [`RequestDescriptor`] is the static table an endpoint request type hands to the
//! binder: its route templates, its fields in declaration order (each with an optional
//! explicit binding, its [`TypeInfo`] and a writer), declared responses and filters.

use serde::de::DeserializeOwned;
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use super::schema::{object_ref, ApiSchema, ObjectRef, SchemaField};
use super::types::{Bindable, ParsedValue, TypeInfo};
use crate::binding::BindFrom;
use crate::filter::RouteFilter;
use crate::route::RouteTemplate;

/// Writes a parsed value into one field of `T`. Returns `false` when the value has the
/// wrong type and nothing was written.
pub type FieldWriter<T> = Arc<dyn Fn(&mut T, ParsedValue) -> bool + Send + Sync>;

/// A field as seen by plan building and document generation.
#[derive(Debug, Clone)]
pub struct FieldMeta {
    pub name: &'static str,
    /// Explicit binding; `None` means "infer".
    pub binding: Option<BindFrom>,
    pub info: TypeInfo,
}

impl FieldMeta {
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.binding.as_ref().is_some_and(|b| b.required)
    }
}

/// A declared `(status, body type)` response.
#[derive(Debug, Clone)]
pub struct ResponseType {
    pub status: u16,
    pub schema: ObjectRef,
}

/// Type-erased description of an endpoint request type.
#[derive(Debug, Clone)]
pub struct EndpointMetadata {
    pub type_id: TypeId,
    /// Fully qualified path, e.g. `sample_project::requests::SampleGetRequest`.
    pub type_name: &'static str,
    pub routes: Vec<RouteTemplate>,
    pub responses: Vec<ResponseType>,
    /// Kept out of the generated document.
    pub ignore_api: bool,
    pub fields: Vec<FieldMeta>,
}

impl EndpointMetadata {
    /// Last path segment of the type name, generics stripped.
    #[must_use]
    pub fn simple_name(&self) -> &'static str {
        simple_name(self.type_name)
    }

    /// Module path of the type, without the type name.
    #[must_use]
    pub fn namespace(&self) -> &'static str {
        let base = self.type_name.split('<').next().unwrap_or(self.type_name);
        base.rsplit_once("::").map_or("", |(ns, _)| ns)
    }

    /// Parameter names of every template, first template first, duplicates removed
    /// ignoring ASCII case.
    #[must_use]
    pub fn template_parameters(&self) -> Vec<String> {
        let mut params: Vec<String> = Vec::new();
        for name in self.routes.iter().flat_map(RouteTemplate::parameter_names) {
            if !params.iter().any(|p| p.eq_ignore_ascii_case(&name)) {
                params.push(name);
            }
        }
        params
    }
}

pub(crate) fn simple_name(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base)
}

/// Static binding table for `T`, built with chained calls.
///
/// ```rust
/// use routebind::binding::BindFrom;
/// use routebind::descriptor::{EndpointRequest, RequestDescriptor};
/// use routebind::route::RouteTemplate;
///
/// #[derive(Default)]
/// struct GetItem {
///     id: i64,
///     verbose: bool,
///     tenant: Option<String>,
/// }
///
/// impl EndpointRequest for GetItem {
///     fn descriptor() -> RequestDescriptor<Self> {
///         RequestDescriptor::<Self>::new()
///             .route(RouteTemplate::get("/items/{id}"))
///             .field("id", |r| &mut r.id)
///             .field("verbose", |r| &mut r.verbose)
///             .bind("tenant", BindFrom::header().named("x-tenant"), |r| &mut r.tenant)
///     }
/// }
///
/// assert_eq!(GetItem::descriptor().metadata().fields.len(), 3);
/// ```
pub struct RequestDescriptor<T> {
    metadata: EndpointMetadata,
    writers: Vec<FieldWriter<T>>,
    filters: Vec<Arc<dyn RouteFilter>>,
}

impl<T> fmt::Debug for RequestDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("metadata", &self.metadata)
            .field("filters", &self.filters.len())
            .finish_non_exhaustive()
    }
}

impl<T: 'static> Default for RequestDescriptor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> RequestDescriptor<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: EndpointMetadata {
                type_id: TypeId::of::<T>(),
                type_name: std::any::type_name::<T>(),
                routes: Vec::new(),
                responses: Vec::new(),
                ignore_api: false,
                fields: Vec::new(),
            },
            writers: Vec::new(),
            filters: Vec::new(),
        }
    }

    #[must_use]
    pub fn route(mut self, route: RouteTemplate) -> Self {
        self.metadata.routes.push(route);
        self
    }

    /// Declare a field whose source is inferred.
    #[must_use]
    pub fn field<F: Bindable>(self, name: &'static str, accessor: fn(&mut T) -> &mut F) -> Self {
        self.push_field::<F>(name, None, accessor)
    }

    /// Declare a field with an explicit binding.
    #[must_use]
    pub fn bind<F: Bindable>(
        self,
        name: &'static str,
        binding: BindFrom,
        accessor: fn(&mut T) -> &mut F,
    ) -> Self {
        self.push_field::<F>(name, Some(binding), accessor)
    }

    /// Declare a field deserialized from the whole JSON body.
    #[must_use]
    pub fn body<F>(mut self, name: &'static str, accessor: fn(&mut T) -> &mut F) -> Self
    where
        F: SchemaField + DeserializeOwned + Send + 'static,
    {
        self.metadata.fields.push(FieldMeta {
            name,
            binding: Some(BindFrom::body()),
            info: TypeInfo::object::<F>(),
        });
        self.writers
            .push(Arc::new(move |target: &mut T, value: ParsedValue| {
                match value.downcast::<F>() {
                    Ok(v) => {
                        *accessor(target) = *v;
                        true
                    }
                    Err(_) => false,
                }
            }));
        self
    }

    /// Declare a response body type for `status`.
    #[must_use]
    pub fn produces<R: ApiSchema>(mut self, status: u16) -> Self {
        self.metadata.responses.push(ResponseType {
            status,
            schema: object_ref::<R>(),
        });
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: impl RouteFilter + 'static) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    #[must_use]
    pub fn ignore_api(mut self) -> Self {
        self.metadata.ignore_api = true;
        self
    }

    fn push_field<F: Bindable>(
        mut self,
        name: &'static str,
        binding: Option<BindFrom>,
        accessor: fn(&mut T) -> &mut F,
    ) -> Self {
        self.metadata.fields.push(FieldMeta {
            name,
            binding,
            info: F::type_info(),
        });
        self.writers
            .push(Arc::new(move |target: &mut T, value: ParsedValue| {
                match F::from_parsed(value) {
                    Some(v) => {
                        *accessor(target) = v;
                        true
                    }
                    None => false,
                }
            }));
        self
    }
}

impl<T> RequestDescriptor<T> {
    #[must_use]
    pub fn metadata(&self) -> &EndpointMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn filters(&self) -> &[Arc<dyn RouteFilter>] {
        &self.filters
    }

    /// Split into metadata, writers (parallel to `metadata.fields`) and filters.
    #[must_use]
    pub fn into_parts(self) -> (EndpointMetadata, Vec<FieldWriter<T>>, Vec<Arc<dyn RouteFilter>>) {
        (self.metadata, self.writers, self.filters)
    }
}

/// An endpoint request type: a plain data type the binder can populate from a request.
///
/// Usually derived with `#[derive(EndpointRequest)]`.
pub trait EndpointRequest: Default + Send + 'static {
    fn descriptor() -> RequestDescriptor<Self>;
}
