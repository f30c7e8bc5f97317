//! Binding plans: the compiled, per-type description of how to populate a request type.

use serde::Deserialize;
use std::fmt;
use tracing::{debug, warn};

use super::error::BindingError;
use super::parser::ParserRegistry;
use super::setter::{BodyField, FieldSetter, ValueSlot};
use super::source::{resolve_binding_source, BindingSource, ResolvedSource};
use crate::descriptor::{AmbientKind, EndpointMetadata, EndpointRequest, FieldWriter, TypeShape};

/// Switches that change how plans are built.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BindingOptions {
    /// Infer route/query sources for unannotated scalar fields.
    pub enable_inferred_binding: bool,
}

impl Default for BindingOptions {
    fn default() -> Self {
        Self {
            enable_inferred_binding: true,
        }
    }
}

/// Fields that receive the ambient context objects.
pub struct AmbientFields<T> {
    pub context: Option<ValueSlot<T>>,
    pub request: Option<ValueSlot<T>>,
    pub response: Option<ValueSlot<T>>,
}

impl<T> AmbientFields<T> {
    fn slot(&mut self, kind: AmbientKind) -> &mut Option<ValueSlot<T>> {
        match kind {
            AmbientKind::Context => &mut self.context,
            AmbientKind::Request => &mut self.request,
            AmbientKind::Response => &mut self.response,
        }
    }
}

/// Compiled binding plan for one endpoint request type.
///
/// Immutable once built; shared by every request bound against the type.
pub struct BindingPlan<T> {
    pub(crate) type_name: &'static str,
    pub(crate) route: Vec<FieldSetter<T>>,
    pub(crate) query: Vec<FieldSetter<T>>,
    pub(crate) header: Vec<FieldSetter<T>>,
    pub(crate) form: Vec<FieldSetter<T>>,
    pub(crate) body_fields: Vec<BodyField<T>>,
    pub(crate) single_file: Option<ValueSlot<T>>,
    pub(crate) file_collection: Option<ValueSlot<T>>,
    pub(crate) ambient: AmbientFields<T>,
    pub(crate) expects_form_body: bool,
    pub(crate) expects_json_body: bool,
    pub(crate) expects_file: bool,
    pub(crate) expects_file_collection: bool,
}

impl<T> fmt::Debug for BindingPlan<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |setters: &[FieldSetter<T>]| -> Vec<&'static str> {
            setters.iter().map(FieldSetter::field).collect()
        };
        f.debug_struct("BindingPlan")
            .field("type_name", &self.type_name)
            .field("route", &names(&self.route))
            .field("query", &names(&self.query))
            .field("header", &names(&self.header))
            .field("form", &names(&self.form))
            .field("body_fields", &self.body_fields)
            .field("single_file", &self.single_file)
            .field("file_collection", &self.file_collection)
            .field("expects_form_body", &self.expects_form_body)
            .field("expects_json_body", &self.expects_json_body)
            .finish_non_exhaustive()
    }
}

impl<T> BindingPlan<T> {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[must_use]
    pub fn route_setters(&self) -> &[FieldSetter<T>] {
        &self.route
    }

    #[must_use]
    pub fn query_setters(&self) -> &[FieldSetter<T>] {
        &self.query
    }

    #[must_use]
    pub fn header_setters(&self) -> &[FieldSetter<T>] {
        &self.header
    }

    #[must_use]
    pub fn form_setters(&self) -> &[FieldSetter<T>] {
        &self.form
    }

    #[must_use]
    pub fn body_fields(&self) -> &[BodyField<T>] {
        &self.body_fields
    }

    #[must_use]
    pub fn single_file_field(&self) -> Option<&'static str> {
        self.single_file.as_ref().map(ValueSlot::field)
    }

    #[must_use]
    pub fn file_collection_field(&self) -> Option<&'static str> {
        self.file_collection.as_ref().map(ValueSlot::field)
    }

    #[must_use]
    pub fn ambient(&self) -> &AmbientFields<T> {
        &self.ambient
    }

    #[must_use]
    pub fn expects_form_body(&self) -> bool {
        self.expects_form_body
    }

    #[must_use]
    pub fn expects_json_body(&self) -> bool {
        self.expects_json_body
    }

    #[must_use]
    pub fn expects_file(&self) -> bool {
        self.expects_file
    }

    #[must_use]
    pub fn expects_file_collection(&self) -> bool {
        self.expects_file_collection
    }

    /// Whether binding needs the request body at all.
    #[must_use]
    pub fn needs_body(&self) -> bool {
        self.expects_form_body
            || self.expects_json_body
            || self.expects_file
            || self.expects_file_collection
    }
}

/// Builds [`BindingPlan`]s from request descriptors.
#[derive(Debug, Clone, Copy)]
pub struct PlanBuilder<'a> {
    parsers: &'a ParserRegistry,
    options: &'a BindingOptions,
}

impl<'a> PlanBuilder<'a> {
    #[must_use]
    pub fn new(parsers: &'a ParserRegistry, options: &'a BindingOptions) -> Self {
        Self { parsers, options }
    }

    /// Build the plan for `T` from its descriptor.
    ///
    /// # Errors
    ///
    /// [`BindingError::UnsupportedType`] if a route/query/header/form field has a type no
    /// parser can handle.
    pub fn build<T: EndpointRequest>(&self) -> Result<BindingPlan<T>, BindingError> {
        let (metadata, writers, _) = T::descriptor().into_parts();
        self.build_from(&metadata, writers)
    }

    /// Build a plan from already split descriptor parts. `writers` is parallel to
    /// `metadata.fields`.
    ///
    /// # Errors
    ///
    /// See [`PlanBuilder::build`].
    pub fn build_from<T>(
        &self,
        metadata: &EndpointMetadata,
        writers: Vec<FieldWriter<T>>,
    ) -> Result<BindingPlan<T>, BindingError> {
        let template_params = metadata.template_parameters();
        let mut plan = BindingPlan {
            type_name: metadata.type_name,
            route: Vec::new(),
            query: Vec::new(),
            header: Vec::new(),
            form: Vec::new(),
            body_fields: Vec::new(),
            single_file: None,
            file_collection: None,
            ambient: AmbientFields {
                context: None,
                request: None,
                response: None,
            },
            expects_form_body: false,
            expects_json_body: false,
            expects_file: false,
            expects_file_collection: false,
        };

        for (field, writer) in metadata.fields.iter().zip(writers) {
            let resolved = resolve_binding_source(
                field,
                &template_params,
                self.options.enable_inferred_binding,
            );
            if resolved == ResolvedSource::Excluded {
                debug!(type_name = metadata.type_name, field = field.name, "Field excluded from binding");
                continue;
            }

            if let TypeShape::Ambient(kind) = field.info.shape {
                let slot = plan.ambient.slot(kind);
                if slot.is_none() {
                    *slot = Some(ValueSlot {
                        field: field.name,
                        writer,
                    });
                }
                continue;
            }

            let ResolvedSource::Bound { source, key } = resolved else {
                debug!(type_name = metadata.type_name, field = field.name, "Field has no binding source");
                continue;
            };

            match source {
                BindingSource::Route
                | BindingSource::Query
                | BindingSource::Header
                | BindingSource::Form
                    if !is_file(field.info.shape) =>
                {
                    let setter = match field.info.shape {
                        TypeShape::StringList => {
                            FieldSetter::string_list(field.name, key, source, writer)
                        }
                        _ => {
                            let parser = self.parsers.resolve(field.name, &field.info)?;
                            FieldSetter::parsed(field.name, key, source, parser, writer)
                        }
                    };
                    match source {
                        BindingSource::Route => plan.route.push(setter),
                        BindingSource::Query => plan.query.push(setter),
                        BindingSource::Header => plan.header.push(setter),
                        _ => {
                            plan.expects_form_body = true;
                            plan.form.push(setter);
                        }
                    }
                }
                BindingSource::Body | BindingSource::File | BindingSource::Form => {
                    classify_body_field(&mut plan, metadata.type_name, field.name, &field.info, writer);
                }
                other => {
                    debug!(
                        type_name = metadata.type_name,
                        field = field.name,
                        source = %other,
                        "Binding source binds nothing"
                    );
                }
            }
        }

        debug!(
            type_name = metadata.type_name,
            route = plan.route.len(),
            query = plan.query.len(),
            header = plan.header.len(),
            form = plan.form.len(),
            body = plan.body_fields.len(),
            expects_file = plan.expects_file,
            expects_file_collection = plan.expects_file_collection,
            "Binding plan built"
        );
        Ok(plan)
    }
}

fn is_file(shape: TypeShape) -> bool {
    matches!(shape, TypeShape::File | TypeShape::FileCollection)
}

fn classify_body_field<T>(
    plan: &mut BindingPlan<T>,
    type_name: &'static str,
    field: &'static str,
    info: &crate::descriptor::TypeInfo,
    writer: FieldWriter<T>,
) {
    match info.shape {
        TypeShape::FileCollection => {
            plan.expects_file_collection = true;
            plan.file_collection = Some(ValueSlot { field, writer });
        }
        TypeShape::File => {
            if let Some(existing) = &plan.single_file {
                warn!(
                    type_name = type_name,
                    field = field,
                    bound = existing.field,
                    "Only one single-file field is bound; ignoring"
                );
                return;
            }
            plan.expects_file = true;
            plan.single_file = Some(ValueSlot { field, writer });
        }
        TypeShape::Object => match info.json_reader {
            Some(reader) => {
                plan.expects_json_body = true;
                plan.body_fields.push(BodyField {
                    field,
                    type_name: info.type_name,
                    reader,
                    writer,
                });
            }
            None => debug!(type_name = type_name, field = field, "Body field has no JSON reader"),
        },
        _ => debug!(
            type_name = type_name,
            field = field,
            "Body designation on a scalar field binds nothing"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindFrom, UploadedFile, UploadedFiles};
    use crate::context::HttpContext;
    use crate::descriptor::RequestDescriptor;
    use crate::route::RouteTemplate;

    #[derive(Default)]
    struct Sample {
        sample_string: String,
        integer_value: i32,
        route_int: i32,
        unbound: i32,
        context: Option<HttpContext>,
    }

    impl EndpointRequest for Sample {
        fn descriptor() -> RequestDescriptor<Self> {
            RequestDescriptor::<Self>::new()
                .route(RouteTemplate::get("/test/{SampleString}/{RouteInt:int}"))
                .field("SampleString", |r| &mut r.sample_string)
                .field("IntegerValue", |r| &mut r.integer_value)
                .field("RouteInt", |r| &mut r.route_int)
                .bind("Unbinded", BindFrom::none(), |r| &mut r.unbound)
                .field("HttpContext", |r| &mut r.context)
        }
    }

    #[derive(Default)]
    struct Upload {
        name: Option<String>,
        file: Option<UploadedFile>,
        other: Option<UploadedFile>,
        all: UploadedFiles,
        flag: bool,
    }

    impl EndpointRequest for Upload {
        fn descriptor() -> RequestDescriptor<Self> {
            RequestDescriptor::<Self>::new()
                .route(RouteTemplate::post("/upload"))
                .bind("FileName", BindFrom::form(), |r| &mut r.name)
                .bind("File", BindFrom::body(), |r| &mut r.file)
                .bind("Other", BindFrom::body(), |r| &mut r.other)
                .bind("All", BindFrom::file(), |r| &mut r.all)
                .bind("Flag", BindFrom::body(), |r| &mut r.flag)
        }
    }

    struct Unsupported;

    impl crate::descriptor::Bindable for Unsupported {
        fn type_info() -> crate::descriptor::TypeInfo {
            crate::descriptor::TypeInfo::scalar::<Unsupported>("string", "string")
        }
    }

    #[derive(Default)]
    struct Broken {
        value: Option<Unsupported>,
    }

    impl EndpointRequest for Broken {
        fn descriptor() -> RequestDescriptor<Self> {
            RequestDescriptor::<Self>::new()
                .route(RouteTemplate::get("/broken"))
                .bind("Value", BindFrom::query(), |r| &mut r.value)
        }
    }

    fn build<T: EndpointRequest>(options: &BindingOptions) -> Result<BindingPlan<T>, BindingError> {
        let parsers = ParserRegistry::with_defaults();
        PlanBuilder::new(&parsers, options).build::<T>()
    }

    #[test]
    fn test_inferred_sources() {
        let plan = build::<Sample>(&BindingOptions::default()).unwrap();
        let route: Vec<_> = plan.route_setters().iter().map(|s| s.key().to_string()).collect();
        let query: Vec<_> = plan.query_setters().iter().map(|s| s.key().to_string()).collect();
        assert_eq!(route, vec!["SampleString", "RouteInt"]);
        assert_eq!(query, vec!["IntegerValue"]);
        assert_eq!(plan.ambient().context.as_ref().map(ValueSlot::field), Some("HttpContext"));
        assert!(!plan.needs_body());
    }

    #[test]
    fn test_inference_disabled_keeps_ambient() {
        let options = BindingOptions {
            enable_inferred_binding: false,
        };
        let plan = build::<Sample>(&options).unwrap();
        assert!(plan.route_setters().is_empty());
        assert!(plan.query_setters().is_empty());
        assert!(plan.ambient().context.is_some());
    }

    #[test]
    fn test_form_and_file_classification() {
        let plan = build::<Upload>(&BindingOptions::default()).unwrap();
        assert!(plan.expects_form_body());
        assert_eq!(plan.form_setters()[0].key(), "FileName");
        assert!(plan.expects_file());
        assert_eq!(plan.single_file_field(), Some("File"));
        assert!(plan.expects_file_collection());
        assert_eq!(plan.file_collection_field(), Some("All"));
        assert!(!plan.expects_json_body());
        assert!(plan.body_fields().is_empty());
    }

    #[test]
    fn test_unsupported_type_fails_at_build() {
        let err = build::<Broken>(&BindingOptions::default()).unwrap_err();
        assert!(matches!(err, BindingError::UnsupportedType { field: "Value", .. }));
    }
}
