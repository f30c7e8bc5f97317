//! Tests for the derive macros
//!
//! # Test Coverage
//!
//! - `EndpointRequest`: routes, names, groups, field order, explicit bindings, responses,
//!   filters, skipped and ambient fields
//! - `ApiSchema`: serde renames, skips and examples
//! - `BindableEnum`: member names and case-insensitive parsing

use http::Method;
use routebind::binding::{BindFrom, BindingSource};
use routebind::descriptor::{
    AmbientKind, ApiSchema, Bindable, EndpointRequest, EnumMembers, SchemaType, TypeShape,
};
use sample_project::models::{TestModel, User, UserRole};
use sample_project::requests::{CreateUserRequest, SampleGetRequest, UploadFileRequest};

#[test]
fn test_sample_get_descriptor() {
    let descriptor = SampleGetRequest::descriptor();
    assert_eq!(descriptor.filters().len(), 1);
    let metadata = descriptor.metadata();

    assert_eq!(metadata.simple_name(), "SampleGetRequest");
    assert_eq!(metadata.namespace(), "sample_project::requests");
    assert_eq!(metadata.routes.len(), 1);
    let route = &metadata.routes[0];
    assert!(route.methods.contains(&Method::GET));
    assert_eq!(route.template, "/test/{SampleString}/{RouteInt:int}");
    assert_eq!(route.name.as_deref(), Some("sampleGet"));
    assert_eq!(route.group.as_deref(), Some("Samples"));

    let names: Vec<&str> = metadata.fields.iter().map(|f| f.name).collect();
    assert_eq!(names, vec!["SampleString", "RouteInt", "IntegerValue", "tenant", "context"]);
    assert!(metadata.fields[0].binding.is_none());
    assert_eq!(
        metadata.fields[3].binding,
        Some(BindFrom::header().named("x-tenant"))
    );
    assert!(metadata.fields[3].info.nullable);
    assert_eq!(
        metadata.fields[4].info.shape,
        TypeShape::Ambient(AmbientKind::Context)
    );

    assert_eq!(metadata.responses.len(), 1);
    assert_eq!(metadata.responses[0].status, 200);
    assert_eq!(metadata.responses[0].schema.name, "TestModel");
}

#[test]
fn test_body_and_form_descriptors() {
    let create = CreateUserRequest::descriptor();
    let field = &create.metadata().fields[0];
    assert_eq!(field.name, "user");
    assert_eq!(field.binding.as_ref().map(|b| b.source), Some(BindingSource::Body));
    assert_eq!(field.info.shape, TypeShape::Object);
    assert!(field.info.json_reader.is_some());

    let upload = UploadFileRequest::descriptor();
    let fields = &upload.metadata().fields;
    assert_eq!(fields[0].binding, Some(BindFrom::form().required()));
    assert!(fields[0].is_required());
    assert_eq!(fields[1].binding, Some(BindFrom::body()));
    assert_eq!(fields[1].info.shape, TypeShape::File);
}

#[test]
fn test_api_schema_properties() {
    assert_eq!(User::schema_name(), "User");
    let properties = User::properties();
    let names: Vec<(&str, &str)> = properties.iter().map(|p| (p.field, p.name.as_str())).collect();
    assert_eq!(
        names,
        vec![("name", "name"), ("email", "email"), ("age", "age"), ("role", "role")]
    );
    assert_eq!(properties[0].example, Some("Ada Lovelace"));
    assert!(properties[1].nullable);
    assert!(!properties[0].nullable);

    let model = TestModel::properties();
    assert_eq!(model[0].name, "stringValue");
    assert_eq!(model[0].field, "string_value");
    assert!(matches!(model.last().map(|p| &p.schema), Some(SchemaType::Enum { .. })));
}

#[test]
fn test_bindable_enum() {
    let members: Vec<&str> = UserRole::members().iter().map(|(name, _)| *name).collect();
    assert_eq!(members, vec!["Member", "Admin", "read-only"]);

    let info = UserRole::type_info();
    assert_eq!(info.shape, TypeShape::Enum);
    let parse = info.enum_parser.unwrap();
    let parsed = parse(" ADMIN ").unwrap();
    assert_eq!(*parsed.downcast::<UserRole>().unwrap(), UserRole::Admin);
    assert!(parse("owner").is_none());
}
