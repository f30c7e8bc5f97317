//! OpenAPI document assembly.

use dashmap::DashMap;
use http::Method;
use once_cell::sync::OnceCell;
use serde_json::{json, Map, Value};
use std::any::TypeId;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::docs::{field_key, type_key, DocSection, DocumentationSource, NoDocumentation};
use super::options::SchemaGeneratorOptions;
use crate::app::EndpointModule;
use crate::binding::{resolve_binding_source, BindingOptions, BindingSource, ResolvedSource};
use crate::descriptor::{EndpointMetadata, FieldMeta, ObjectRef, SchemaType, TypeShape};
use crate::route::RouteTemplate;

/// OpenAPI version written to every document.
pub const OPENAPI_VERSION: &str = "3.0.1";

struct CachedSchema {
    schema: Value,
    nested: Vec<ObjectRef>,
}

/// Builds the OpenAPI document for one [`EndpointModule`].
///
/// The document is generated on the first call to [`OpenApiGenerator::document`] and
/// returned unchanged afterwards. Component schemas are cached by type.
pub struct OpenApiGenerator {
    module: EndpointModule,
    options: SchemaGeneratorOptions,
    binding: BindingOptions,
    docs: Arc<dyn DocumentationSource>,
    schemas: DashMap<TypeId, Arc<CachedSchema>>,
    document: OnceCell<String>,
}

impl fmt::Debug for OpenApiGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenApiGenerator")
            .field("module", &self.module.name())
            .field("options", &self.options)
            .field("cached_schemas", &self.schemas.len())
            .field("generated", &self.document.get().is_some())
            .finish()
    }
}

/// Per-build bookkeeping: which components the document references, in first-use order.
#[derive(Default)]
struct Components {
    seen: HashSet<TypeId>,
    names: HashSet<&'static str>,
    schemas: Vec<(&'static str, Value)>,
}

/// Form properties collected for one operation.
#[derive(Default)]
struct FormBody {
    properties: Map<String, Value>,
}

impl OpenApiGenerator {
    #[must_use]
    pub fn new(module: EndpointModule, options: SchemaGeneratorOptions) -> Self {
        Self {
            module,
            options,
            binding: BindingOptions::default(),
            docs: Arc::new(NoDocumentation),
            schemas: DashMap::new(),
            document: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn with_documentation(mut self, docs: Arc<dyn DocumentationSource>) -> Self {
        self.docs = docs;
        self
    }

    /// Binding options used when inferring parameter sources.
    #[must_use]
    pub fn with_binding_options(mut self, binding: BindingOptions) -> Self {
        self.binding = binding;
        self
    }

    #[must_use]
    pub fn options(&self) -> &SchemaGeneratorOptions {
        &self.options
    }

    #[must_use]
    pub fn module(&self) -> &EndpointModule {
        &self.module
    }

    /// The serialized document, generated once.
    pub fn document(&self) -> &str {
        self.document.get_or_init(|| {
            let document = self.build_document();
            let text = serde_json::to_string_pretty(&document).unwrap_or_else(|e| {
                warn!(error = %e, "Failed to serialize OpenAPI document");
                String::from("{}")
            });
            info!(
                module = self.module.name(),
                bytes = text.len(),
                "OpenAPI document generated"
            );
            text
        })
    }

    /// Assemble the document without touching the memoized text.
    #[must_use]
    pub fn build_document(&self) -> Value {
        let mut components = Components::default();
        let mut paths = Map::new();

        for metadata in self.module.metadata() {
            if metadata.ignore_api {
                debug!(type_name = metadata.type_name, "Endpoint excluded from document");
                continue;
            }
            for route in &metadata.routes {
                let Some(method) = documented_method(route) else {
                    debug!(
                        type_name = metadata.type_name,
                        template = %route.template,
                        methods = %route.methods,
                        "Route method not documented"
                    );
                    continue;
                };
                let operation = self.operation(&metadata, route, &method, &mut components);
                let path_item = paths
                    .entry(route.render())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(item) = path_item {
                    let key = method.as_str().to_ascii_lowercase();
                    if item.contains_key(&key) {
                        warn!(
                            type_name = metadata.type_name,
                            path = %route.render(),
                            method = %method,
                            "Duplicate operation; keeping the first"
                        );
                    } else {
                        item.insert(key, operation);
                    }
                }
            }
        }

        let mut document = Map::new();
        document.insert("openapi".into(), json!(OPENAPI_VERSION));
        document.insert("info".into(), self.info());
        document.insert("paths".into(), Value::Object(paths));

        let mut component_map = Map::new();
        let schemas: Map<String, Value> = components
            .schemas
            .into_iter()
            .map(|(name, schema)| (name.to_string(), schema))
            .collect();
        component_map.insert("schemas".into(), Value::Object(schemas));
        if !self.options.security_schemes.is_empty() {
            let schemes: Map<String, Value> = self
                .options
                .security_schemes
                .iter()
                .filter_map(|(name, scheme)| {
                    serde_json::to_value(scheme).ok().map(|v| (name.clone(), v))
                })
                .collect();
            component_map.insert("securitySchemes".into(), Value::Object(schemes));
        }
        document.insert("components".into(), Value::Object(component_map));

        let security = self.document_security();
        if !security.is_empty() {
            document.insert("security".into(), Value::Array(security));
        }

        Value::Object(document)
    }

    fn info(&self) -> Value {
        let info = &self.options.info;
        let mut map = Map::new();
        map.insert("title".into(), json!(info.title));
        map.insert("version".into(), json!(info.version));
        if let Some(description) = &info.description {
            map.insert("description".into(), json!(description));
        }
        Value::Object(map)
    }

    fn requirements(&self) -> Vec<Value> {
        self.options
            .security_requirements
            .iter()
            .filter_map(|r| serde_json::to_value(r).ok())
            .collect()
    }

    // Configured requirements plus one naming every scheme, unless already listed.
    fn document_security(&self) -> Vec<Value> {
        let mut security = self.requirements();
        if !self.options.security_schemes.is_empty() {
            let all: Map<String, Value> = self
                .options
                .security_schemes
                .keys()
                .map(|name| (name.clone(), json!([])))
                .collect();
            let all = Value::Object(all);
            if !security.contains(&all) {
                security.push(all);
            }
        }
        security
    }

    fn doc(&self, member: &str, section: DocSection) -> Option<String> {
        self.docs.lookup(member, section)
    }

    fn operation(
        &self,
        metadata: &EndpointMetadata,
        route: &RouteTemplate,
        method: &Method,
        components: &mut Components,
    ) -> Value {
        let type_member = type_key(metadata.type_name);
        let mut operation = Map::new();
        let group = route
            .group
            .clone()
            .unwrap_or_else(|| self.options.group_name(metadata));
        operation.insert("tags".into(), json!([group]));
        if let Some(summary) = self.doc(&type_member, DocSection::Summary) {
            operation.insert("summary".into(), json!(summary));
        }
        if let Some(remarks) = self.doc(&type_member, DocSection::Remarks) {
            operation.insert("description".into(), json!(remarks));
        }
        if let Some(name) = &route.name {
            operation.insert("operationId".into(), json!(name));
        }

        let template_params = route.parameter_names();
        let (mut route_params, mut query_params, mut header_params) =
            (Vec::new(), Vec::new(), Vec::new());
        let mut form = FormBody::default();
        let mut json_body: Option<(&FieldMeta, Value)> = None;

        for field in &metadata.fields {
            let resolved =
                resolve_binding_source(field, &template_params, self.binding.enable_inferred_binding);
            let ResolvedSource::Bound { source, key } = resolved else {
                continue;
            };
            if matches!(field.info.shape, TypeShape::Ambient(_)) {
                continue;
            }
            let is_file = matches!(
                field.info.shape,
                TypeShape::File | TypeShape::FileCollection
            );
            match source {
                BindingSource::Route if !is_file => {
                    route_params.push(self.parameter(metadata, field, source, &key));
                }
                BindingSource::Query if !is_file => {
                    query_params.push(self.parameter(metadata, field, source, &key));
                }
                BindingSource::Header if !is_file => {
                    header_params.push(self.parameter(metadata, field, source, &key));
                }
                BindingSource::Form if !is_file => {
                    form.properties
                        .insert(key, self.form_property(metadata, field, components));
                }
                BindingSource::Body | BindingSource::File | BindingSource::Form if is_file => {
                    form.properties.insert(key, file_property(field.info.shape, field.info.nullable));
                }
                BindingSource::Body if field.info.shape == TypeShape::Object => {
                    if json_body.is_none() {
                        let schema = self.schema_value(&field.info.schema, components);
                        json_body = Some((field, schema));
                    }
                }
                _ => {}
            }
        }

        let mut parameters = route_params;
        parameters.extend(query_params);
        parameters.extend(header_params);
        if !parameters.is_empty() {
            operation.insert("parameters".into(), Value::Array(parameters));
        }

        if has_body(method) {
            if !form.properties.is_empty() {
                operation.insert("requestBody".into(), form_request_body(form));
            } else if let Some((field, schema)) = json_body {
                operation.insert(
                    "requestBody".into(),
                    self.json_request_body(metadata, field, schema),
                );
            }
        }

        operation.insert("responses".into(), self.responses(metadata, components));

        let requirements = self.requirements();
        if !requirements.is_empty() {
            operation.insert("security".into(), Value::Array(requirements));
        }
        Value::Object(operation)
    }

    fn parameter(
        &self,
        metadata: &EndpointMetadata,
        field: &FieldMeta,
        source: BindingSource,
        key: &str,
    ) -> Value {
        let member = field_key(metadata.type_name, field.name);
        let location = match source {
            BindingSource::Route => "path",
            BindingSource::Header => "header",
            _ => "query",
        };
        let mut parameter = Map::new();
        parameter.insert("name".into(), json!(key));
        parameter.insert("in".into(), json!(location));
        if let Some(summary) = self.doc(&member, DocSection::Summary) {
            parameter.insert("description".into(), json!(summary));
        }
        if source == BindingSource::Route {
            parameter.insert("required".into(), json!(true));
            parameter.insert("allowEmptyValue".into(), json!(false));
        } else {
            parameter.insert("allowEmptyValue".into(), json!(true));
        }
        parameter.insert("schema".into(), scalar_schema(&field.info.schema));
        if let Some(example) = self.doc(&member, DocSection::Example) {
            parameter.insert("example".into(), json!(example));
        }
        Value::Object(parameter)
    }

    fn form_property(
        &self,
        metadata: &EndpointMetadata,
        field: &FieldMeta,
        components: &mut Components,
    ) -> Value {
        let member = field_key(metadata.type_name, field.name);
        let mut property = match self.schema_value(&field.info.schema, components) {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        property.insert(
            "nullable".into(),
            json!(field.info.nullable || !field.is_required()),
        );
        if let Some(summary) = self.doc(&member, DocSection::Summary) {
            property.insert("description".into(), json!(summary));
        }
        if let Some(example) = self.doc(&member, DocSection::Example) {
            property.insert("example".into(), json!(example));
        }
        Value::Object(property)
    }

    fn json_request_body(&self, metadata: &EndpointMetadata, field: &FieldMeta, schema: Value) -> Value {
        let member = field_key(metadata.type_name, field.name);
        let mut media = Map::new();
        media.insert("schema".into(), schema);
        if let Some(example) = self.doc(&member, DocSection::Example) {
            media.insert("example".into(), json!(example));
        }
        let mut body = Map::new();
        if let Some(summary) = self.doc(&member, DocSection::Summary) {
            body.insert("description".into(), json!(summary));
        }
        body.insert("content".into(), json!({ "application/json": media }));
        body.insert("required".into(), json!(!field.info.nullable));
        Value::Object(body)
    }

    fn responses(&self, metadata: &EndpointMetadata, components: &mut Components) -> Value {
        if metadata.responses.is_empty() {
            return json!({ "200": { "description": "" } });
        }
        let mut responses = Map::new();
        for response in &metadata.responses {
            let status = response.status.to_string();
            if responses.contains_key(&status) {
                continue;
            }
            let description = self
                .doc(&type_key(response.schema.type_path), DocSection::Summary)
                .unwrap_or_default();
            let schema = self.component_ref(&response.schema, components);
            responses.insert(
                status,
                json!({
                    "description": description,
                    "content": { "application/json": { "schema": schema } }
                }),
            );
        }
        Value::Object(responses)
    }

    fn schema_value(&self, schema: &SchemaType, components: &mut Components) -> Value {
        let mut nested = Vec::new();
        let value = schema_json(schema, &mut nested);
        for object in &nested {
            self.register_component(object, components);
        }
        value
    }

    fn component_ref(&self, object: &ObjectRef, components: &mut Components) -> Value {
        self.register_component(object, components);
        reference(object)
    }

    fn register_component(&self, object: &ObjectRef, components: &mut Components) {
        if !components.seen.insert(object.type_id) {
            return;
        }
        if !components.names.insert(object.name) {
            warn!(
                name = object.name,
                type_path = object.type_path,
                "Component name already used by another type; keeping the first"
            );
            return;
        }
        let slot = components.schemas.len();
        components.schemas.push((object.name, Value::Null));

        let cached = match self.schemas.get(&object.type_id).map(|c| Arc::clone(&c)) {
            Some(cached) => cached,
            None => {
                let built = Arc::new(self.object_schema(object));
                self.schemas.insert(object.type_id, Arc::clone(&built));
                debug!(name = object.name, "Component schema built");
                built
            }
        };
        components.schemas[slot].1 = cached.schema.clone();
        for nested in &cached.nested {
            self.register_component(nested, components);
        }
    }

    fn object_schema(&self, object: &ObjectRef) -> CachedSchema {
        let described = (object.describe)();
        let mut nested = Vec::new();
        let mut properties = Map::new();
        for property in &described.properties {
            let mut value = schema_json(&property.schema, &mut nested);
            if let Value::Object(map) = &mut value {
                let member = field_key(described.type_path, property.field);
                if property.nullable {
                    map.insert("nullable".into(), json!(true));
                }
                if let Some(summary) = self.doc(&member, DocSection::Summary) {
                    map.insert("description".into(), json!(summary));
                }
                let example = property
                    .example
                    .map(str::to_string)
                    .or_else(|| self.doc(&member, DocSection::Example));
                if let Some(example) = example {
                    map.insert("example".into(), json!(example));
                }
            }
            properties.insert(property.name.clone(), value);
        }

        let mut schema = Map::new();
        schema.insert("type".into(), json!("object"));
        if let Some(summary) = self.doc(&type_key(described.type_path), DocSection::Summary) {
            schema.insert("description".into(), json!(summary));
        }
        schema.insert("properties".into(), Value::Object(properties));
        CachedSchema {
            schema: Value::Object(schema),
            nested,
        }
    }
}

fn documented_method(route: &RouteTemplate) -> Option<Method> {
    let method = route.methods.first()?;
    (*method != Method::CONNECT).then(|| method.clone())
}

fn has_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

fn reference(object: &ObjectRef) -> Value {
    json!({ "$ref": format!("#/components/schemas/{}", object.name) })
}

fn schema_json(schema: &SchemaType, nested: &mut Vec<ObjectRef>) -> Value {
    match schema {
        SchemaType::Primitive { ty, format } => json!({ "type": ty, "format": format }),
        SchemaType::Enum { members } => json!({ "type": "string", "enum": members() }),
        SchemaType::Array(item) => json!({ "type": "array", "items": schema_json(item, nested) }),
        SchemaType::Object(object) => {
            nested.push(*object);
            reference(object)
        }
    }
}

// Parameters only carry primitive type/format.
fn scalar_schema(schema: &SchemaType) -> Value {
    match schema {
        SchemaType::Enum { members } => json!({ "type": "string", "enum": members() }),
        SchemaType::Array(item) => json!({ "type": "array", "items": scalar_schema(item) }),
        other => {
            let (ty, format) = other.type_and_format();
            json!({ "type": ty, "format": format })
        }
    }
}

fn file_property(shape: TypeShape, nullable: bool) -> Value {
    let binary = json!({ "type": "string", "format": "binary" });
    if shape == TypeShape::FileCollection {
        json!({ "type": "array", "items": binary, "nullable": nullable })
    } else {
        json!({ "type": "string", "format": "binary", "nullable": nullable })
    }
}

fn form_request_body(form: FormBody) -> Value {
    let encoding: Map<String, Value> = form
        .properties
        .keys()
        .map(|name| (name.clone(), json!({ "style": "form" })))
        .collect();
    let media = json!({
        "schema": { "type": "object", "properties": Value::Object(form.properties) },
        "encoding": Value::Object(encoding),
    });
    json!({
        "required": true,
        "content": {
            "multipart/form-data": media.clone(),
            "application/x-www-form-urlencoded": media,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindFrom, UploadedFile};
    use crate::descriptor::{ApiSchema, EndpointRequest, PropertySchema, RequestDescriptor};
    use crate::openapi::StaticDocumentation;

    #[derive(Debug, Default, serde::Deserialize)]
    struct Pet {
        name: String,
    }

    impl ApiSchema for Pet {
        fn schema_name() -> &'static str {
            "Pet"
        }

        fn properties() -> Vec<PropertySchema> {
            vec![PropertySchema::of::<String>("name", "name")]
        }
    }

    impl crate::descriptor::SchemaField for Pet {
        fn schema_type() -> SchemaType {
            SchemaType::Object(crate::descriptor::object_ref::<Pet>())
        }
    }

    #[derive(Default)]
    struct GetPet {
        id: i64,
        verbose: bool,
        trace: Option<String>,
    }

    impl EndpointRequest for GetPet {
        fn descriptor() -> RequestDescriptor<Self> {
            RequestDescriptor::<Self>::new()
                .route(RouteTemplate::get("/pets/{id:long}"))
                .field("id", |r| &mut r.id)
                .field("verbose", |r| &mut r.verbose)
                .bind("trace", BindFrom::header().named("x-trace"), |r| &mut r.trace)
                .produces::<Pet>(200)
        }
    }

    #[derive(Default)]
    struct AddPet {
        pet: Pet,
    }

    impl EndpointRequest for AddPet {
        fn descriptor() -> RequestDescriptor<Self> {
            RequestDescriptor::<Self>::new()
                .route(RouteTemplate::post("/pets"))
                .body("pet", |r| &mut r.pet)
        }
    }

    #[derive(Default)]
    struct UploadPhoto {
        caption: String,
        photo: Option<UploadedFile>,
        pet: Pet,
    }

    impl EndpointRequest for UploadPhoto {
        fn descriptor() -> RequestDescriptor<Self> {
            RequestDescriptor::<Self>::new()
                .route(RouteTemplate::post("/pets/photo"))
                .bind("caption", BindFrom::form().required(), |r| &mut r.caption)
                .bind("photo", BindFrom::body(), |r| &mut r.photo)
                .body("pet", |r| &mut r.pet)
        }
    }

    #[derive(Default)]
    struct Anything;

    impl EndpointRequest for Anything {
        fn descriptor() -> RequestDescriptor<Self> {
            RequestDescriptor::new().route(RouteTemplate::any("/anything"))
        }
    }

    fn generator() -> OpenApiGenerator {
        let module = EndpointModule::new("petstore")
            .endpoint::<GetPet>()
            .endpoint::<AddPet>()
            .endpoint::<UploadPhoto>()
            .endpoint::<Anything>();
        OpenApiGenerator::new(module, SchemaGeneratorOptions::new().with_info("Pets", "1.0"))
    }

    #[test]
    fn test_parameters_and_responses() {
        let doc = generator().build_document();
        let get = &doc["paths"]["/pets/{id}"]["get"];
        let params = get["parameters"].as_array().unwrap();
        assert_eq!(params.len(), 3);
        assert_eq!(params[0]["in"], "path");
        assert_eq!(params[0]["required"], true);
        assert_eq!(params[0]["schema"]["format"], "int64");
        assert_eq!(params[1]["name"], "verbose");
        assert_eq!(params[1]["allowEmptyValue"], true);
        assert_eq!(params[2]["in"], "header");
        assert_eq!(params[2]["name"], "x-trace");
        assert_eq!(
            get["responses"]["200"]["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/Pet"
        );
        assert!(doc["paths"].get("/anything").is_none());
    }

    #[derive(Default)]
    struct FindPet {
        trace: Option<String>,
        verbose: bool,
        id: i64,
    }

    impl EndpointRequest for FindPet {
        fn descriptor() -> RequestDescriptor<Self> {
            RequestDescriptor::<Self>::new()
                .route(RouteTemplate::get("/owners/{id}"))
                .bind("trace", BindFrom::header().named("x-trace"), |r| &mut r.trace)
                .field("verbose", |r| &mut r.verbose)
                .field("id", |r| &mut r.id)
        }
    }

    #[test]
    fn test_parameters_are_grouped_path_query_header() {
        let module = EndpointModule::new("owners").endpoint::<FindPet>();
        let doc = OpenApiGenerator::new(module, SchemaGeneratorOptions::new()).build_document();
        let params = doc["paths"]["/owners/{id}"]["get"]["parameters"].as_array().unwrap();
        let order: Vec<(&str, &str)> = params
            .iter()
            .map(|p| (p["in"].as_str().unwrap(), p["name"].as_str().unwrap()))
            .collect();
        assert_eq!(
            order,
            vec![("path", "id"), ("query", "verbose"), ("header", "x-trace")]
        );
    }

    #[test]
    fn test_json_body_and_form_precedence() {
        let doc = generator().build_document();
        let add = &doc["paths"]["/pets"]["post"];
        assert_eq!(
            add["requestBody"]["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/Pet"
        );
        assert_eq!(add["responses"]["200"]["description"], "");

        let upload = &doc["paths"]["/pets/photo"]["post"]["requestBody"];
        assert!(upload["content"].get("application/json").is_none());
        let props = &upload["content"]["multipart/form-data"]["schema"]["properties"];
        assert_eq!(props["caption"]["nullable"], false);
        assert_eq!(props["photo"]["format"], "binary");
        assert!(upload["content"]["application/x-www-form-urlencoded"].is_object());
    }

    #[test]
    fn test_components_are_deduplicated() {
        let doc = generator().build_document();
        let schemas = doc["components"]["schemas"].as_object().unwrap();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas["Pet"]["properties"]["name"]["type"], "string");
    }

    #[test]
    fn test_documentation_is_applied() {
        let docs = StaticDocumentation::new()
            .with(type_key(std::any::type_name::<GetPet>()), DocSection::Summary, "Get a pet.")
            .with(
                field_key(std::any::type_name::<GetPet>(), "id"),
                DocSection::Example,
                "7",
            );
        let doc = generator().with_documentation(Arc::new(docs)).build_document();
        let get = &doc["paths"]["/pets/{id}"]["get"];
        assert_eq!(get["summary"], "Get a pet.");
        assert_eq!(get["parameters"][0]["example"], "7");
    }

    #[test]
    fn test_security_requirements() {
        let module = EndpointModule::new("petstore").endpoint::<GetPet>();
        let options = SchemaGeneratorOptions::new().add_default_bearer_scheme();
        let doc = OpenApiGenerator::new(module, options).build_document();
        assert_eq!(doc["components"]["securitySchemes"]["Bearer"]["scheme"], "bearer");
        assert_eq!(doc["security"], json!([{ "Bearer": [] }]));
        assert!(doc["paths"]["/pets/{id}"]["get"].get("security").is_none());
    }

    #[test]
    fn test_document_is_memoized() {
        let generator = generator();
        let first = generator.document().to_string();
        assert!(std::ptr::eq(generator.document(), generator.document()));
        assert_eq!(first, generator.document());
        let parsed: Value = serde_json::from_str(&first).unwrap();
        assert_eq!(parsed["openapi"], OPENAPI_VERSION);
    }
}
