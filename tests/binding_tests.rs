//! Integration tests for binding plans and request materialization
//!
//! # Test Coverage
//!
//! - Plan caching: repeated and concurrent builds hand out the same plan
//! - Source inference against route templates (route first, query otherwise)
//! - Skipped fields never bind
//! - Soft failure for malformed scalars, hard failure for malformed JSON
//! - Header, repeated query, urlencoded and multipart form binding
//! - Host parsers, self-parsing types and disabled inference
//! - Cancellation while the body is read

use http::Method;
use routebind::binding::{
    BindFrom, BindingError, BindingOptions, BindingSource, Materializer, ParserRegistry, PlanCache,
    UploadedFile, UploadedFiles,
};
use routebind::context::{AbortSignal, HttpContext, RequestHead, RequestId};
use routebind::descriptor::{Bindable, EndpointRequest, RequestDescriptor, TryParse, TypeInfo};
use routebind::route::RouteTemplate;
use routebind::server::ParsedRequest;
use serde::Deserialize;
use std::sync::Arc;
use std::thread;

mod common;
use common::multipart;

#[allow(non_snake_case)]
#[derive(Debug, Default, routebind::EndpointRequest)]
#[endpoint(get = "/test/{SampleString}/{RouteInt}")]
struct InferenceProbe {
    SampleString: String,
    RouteInt: i32,
    IntegerValue: i32,
    #[bind(skip)]
    Ignored: i32,
}

#[derive(Debug, Default)]
struct ExcludedProbe {
    value: i32,
    kept: i32,
}

impl EndpointRequest for ExcludedProbe {
    fn descriptor() -> RequestDescriptor<Self> {
        RequestDescriptor::<Self>::new()
            .route(RouteTemplate::get("/excluded/{value}"))
            .bind("value", BindFrom::none(), |r| &mut r.value)
            .field("kept", |r| &mut r.kept)
    }
}

#[derive(Debug, Default, routebind::EndpointRequest)]
#[endpoint(get = "/search")]
struct SearchRequest {
    #[bind(query, name = "tag")]
    tags: Vec<String>,
    page: u32,
    #[bind(header, name = "X-Tenant")]
    tenant: Option<String>,
    #[bind(header, name = "x-retries")]
    retries: Option<u8>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, routebind::ApiSchema)]
struct Note {
    title: String,
    body: Option<String>,
}

#[derive(Debug, Default, routebind::EndpointRequest)]
#[endpoint(post = "/notes/{id}")]
struct CreateNote {
    id: u64,
    #[bind(body)]
    note: Note,
}

#[derive(Debug, Default, routebind::EndpointRequest)]
#[endpoint(post = "/forms")]
struct FormRequest {
    #[bind(form)]
    title: String,
    #[bind(form, name = "count")]
    amount: i32,
    #[bind(file)]
    attachment: Option<UploadedFile>,
}

#[derive(Debug, Default, routebind::EndpointRequest)]
#[endpoint(post = "/gallery")]
struct GalleryRequest {
    #[bind(form)]
    album: String,
    #[bind(file)]
    photos: UploadedFiles,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Cents(i64);

impl TryParse for Cents {
    fn try_parse(input: &str) -> Option<Self> {
        let (whole, frac) = input.trim().split_once('.')?;
        let frac: i64 = frac.parse().ok()?;
        Some(Cents(whole.parse::<i64>().ok()? * 100 + frac))
    }
}

impl Bindable for Cents {
    fn type_info() -> TypeInfo {
        TypeInfo::parsable::<Cents>("string", "money")
    }
}

#[derive(Debug, Default, routebind::EndpointRequest)]
#[endpoint(get = "/prices")]
struct PriceRequest {
    price: Cents,
    #[bind(query)]
    code: u32,
}

fn materialize<T: EndpointRequest>(cache: &PlanCache, request: &mut ParsedRequest) -> Result<T, BindingError> {
    Materializer::new(cache).materialize::<T, _>(request, &HttpContext::default())
}

fn with_route(mut request: ParsedRequest, values: &[(&str, &str)]) -> ParsedRequest {
    for (name, value) in values {
        request.route_values.push((Arc::from(*name), (*value).to_string()));
    }
    request
}

#[test]
fn test_plan_is_built_once_and_reused() {
    let cache = PlanCache::default();
    let first = cache.get_or_build::<InferenceProbe>().unwrap();
    let second = cache.get_or_build::<InferenceProbe>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);
    assert!(cache.contains::<InferenceProbe>());
}

#[test]
fn test_concurrent_plan_builds_publish_one_plan() {
    let cache = Arc::new(PlanCache::default());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.get_or_build::<InferenceProbe>().unwrap())
        })
        .collect();
    let plans: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for plan in &plans[1..] {
        assert!(Arc::ptr_eq(&plans[0], plan));
    }

    let mut request = with_route(
        ParsedRequest::new(Method::GET, "/test/abc/5?IntegerValue=9"),
        &[("SampleString", "abc"), ("RouteInt", "5")],
    );
    let bound: InferenceProbe = materialize(&cache, &mut request).unwrap();
    assert_eq!(bound.SampleString, "abc");
    assert_eq!(bound.RouteInt, 5);
    assert_eq!(bound.IntegerValue, 9);
}

#[test]
fn test_inference_against_template() {
    let cache = PlanCache::default();
    let plan = cache.get_or_build::<InferenceProbe>().unwrap();

    let route: Vec<(&str, &str, BindingSource)> = plan
        .route_setters()
        .iter()
        .map(|s| (s.field(), s.key(), s.source()))
        .collect();
    assert_eq!(
        route,
        vec![
            ("SampleString", "SampleString", BindingSource::Route),
            ("RouteInt", "RouteInt", BindingSource::Route),
        ]
    );
    let query: Vec<&str> = plan.query_setters().iter().map(|s| s.field()).collect();
    assert_eq!(query, vec!["IntegerValue"]);
}

#[test]
fn test_skipped_field_never_binds() {
    let cache = PlanCache::default();
    let mut request = with_route(
        ParsedRequest::new(Method::GET, "/test/a/1?Ignored=7&ignored=8"),
        &[("SampleString", "a"), ("RouteInt", "1"), ("Ignored", "9")],
    );
    let bound: InferenceProbe = materialize(&cache, &mut request).unwrap();
    assert_eq!(bound.Ignored, 0);

    let metadata = InferenceProbe::descriptor().into_parts().0;
    assert!(metadata.fields.iter().all(|f| f.name != "Ignored"));
}

#[test]
fn test_explicit_none_excludes_route_match() {
    let cache = PlanCache::default();
    let plan = cache.get_or_build::<ExcludedProbe>().unwrap();
    assert!(plan.route_setters().is_empty());
    assert_eq!(plan.query_setters().len(), 1);

    let mut request = with_route(
        ParsedRequest::new(Method::GET, "/excluded/4?value=5&kept=6"),
        &[("value", "4")],
    );
    let bound: ExcludedProbe = materialize(&cache, &mut request).unwrap();
    assert_eq!(bound.value, 0);
    assert_eq!(bound.kept, 6);
}

#[test]
fn test_malformed_scalar_leaves_default() {
    let cache = PlanCache::default();
    let mut request = with_route(
        ParsedRequest::new(Method::GET, "/test/a/1?IntegerValue=notanumber"),
        &[("SampleString", "a"), ("RouteInt", "1")],
    );
    let bound: InferenceProbe = materialize(&cache, &mut request).unwrap();
    assert_eq!(bound.IntegerValue, 0);
    assert_eq!(bound.RouteInt, 1);
}

#[test]
fn test_query_lists_headers_and_case_insensitive_keys() {
    let cache = PlanCache::default();
    let mut request = ParsedRequest::new(Method::GET, "/search?tag=red&TAG=blue&Page=3&page=4")
        .with_header("x-tenant", "acme")
        .with_header("X-Retries", "lots");
    let bound: SearchRequest = materialize(&cache, &mut request).unwrap();
    assert_eq!(bound.tags, vec!["red".to_string(), "blue".to_string()]);
    assert_eq!(bound.page, 3);
    assert_eq!(bound.tenant.as_deref(), Some("acme"));
    assert_eq!(bound.retries, None);
}

#[test]
fn test_json_body_binding() {
    let cache = PlanCache::default();
    let mut request = with_route(
        ParsedRequest::new(Method::POST, "/notes/12")
            .with_header("Content-Type", "application/json; charset=utf-8")
            .with_body(br#"{"title":"hello","body":"world"}"#.to_vec()),
        &[("id", "12")],
    );
    let bound: CreateNote = materialize(&cache, &mut request).unwrap();
    assert_eq!(bound.id, 12);
    assert_eq!(
        bound.note,
        Note {
            title: "hello".to_string(),
            body: Some("world".to_string())
        }
    );
}

#[test]
fn test_malformed_and_empty_json_are_rejected() {
    let cache = PlanCache::default();
    for body in [&b"{\"title\":"[..], &b""[..]] {
        let mut request = ParsedRequest::new(Method::POST, "/notes/1")
            .with_header("content-type", "application/problem+json")
            .with_body(body.to_vec());
        let err = materialize::<CreateNote>(&cache, &mut request).unwrap_err();
        assert!(matches!(err, BindingError::MalformedJson { .. }), "{err:?}");
        assert!(err.is_client_error());
    }
}

#[test]
fn test_json_body_ignored_without_json_content_type() {
    let cache = PlanCache::default();
    let mut request = ParsedRequest::new(Method::POST, "/notes/1")
        .with_header("content-type", "text/plain")
        .with_body(b"{not json".to_vec());
    let bound: CreateNote = materialize(&cache, &mut request).unwrap();
    assert_eq!(bound.note, Note::default());
}

#[test]
fn test_urlencoded_form_binding() {
    let cache = PlanCache::default();
    let mut request = ParsedRequest::new(Method::POST, "/forms")
        .with_header("content-type", "application/x-www-form-urlencoded")
        .with_body(b"title=hello+world&COUNT=7".to_vec());
    let bound: FormRequest = materialize(&cache, &mut request).unwrap();
    assert_eq!(bound.title, "hello world");
    assert_eq!(bound.amount, 7);
    assert!(bound.attachment.is_none());
}

#[test]
fn test_multipart_form_with_file() {
    let cache = PlanCache::default();
    let body = multipart::body(
        &[("title", "report"), ("count", "2")],
        &[("attachment", "report.txt", "text/plain", b"line one\nline two")],
    );
    let mut request = ParsedRequest::new(Method::POST, "/forms")
        .with_header("content-type", multipart::content_type())
        .with_body(body);
    let bound: FormRequest = materialize(&cache, &mut request).unwrap();
    assert_eq!(bound.title, "report");
    assert_eq!(bound.amount, 2);
    let file = bound.attachment.unwrap();
    assert_eq!(file.file_name, "report.txt");
    assert_eq!(file.content_type.as_deref(), Some("text/plain"));
    assert_eq!(file.data, b"line one\nline two");
}

#[test]
fn test_file_collection_receives_every_file() {
    let cache = PlanCache::default();
    let body = multipart::body(
        &[("album", "summer")],
        &[
            ("photos", "a.png", "image/png", b"\x89PNGa"),
            ("photos", "b.png", "image/png", b"\x89PNGb"),
        ],
    );
    let mut request = ParsedRequest::new(Method::POST, "/gallery")
        .with_header("content-type", multipart::content_type())
        .with_body(body);
    let bound: GalleryRequest = materialize(&cache, &mut request).unwrap();
    assert_eq!(bound.album, "summer");
    assert_eq!(bound.photos.len(), 2);
    let names: Vec<&str> = bound.photos.iter().map(|f| f.file_name.as_str()).collect();
    assert_eq!(names, vec!["a.png", "b.png"]);
    assert_eq!(bound.photos.get("PHOTOS").map(|f| f.data.as_slice()), Some(&b"\x89PNGa"[..]));
}

#[test]
fn test_file_collection_is_empty_without_form() {
    let cache = PlanCache::default();
    let mut request = ParsedRequest::new(Method::POST, "/gallery");
    let bound: GalleryRequest = materialize(&cache, &mut request).unwrap();
    assert!(bound.photos.is_empty());
}

#[test]
fn test_broken_multipart_is_rejected() {
    let cache = PlanCache::default();
    let mut request = ParsedRequest::new(Method::POST, "/forms")
        .with_header("content-type", "multipart/form-data")
        .with_body(b"--x\r\n".to_vec());
    let err = materialize::<FormRequest>(&cache, &mut request).unwrap_err();
    assert!(matches!(err, BindingError::Rejected(_)), "{err:?}");
}

#[test]
fn test_self_parsing_type_and_host_parser_override() {
    let cache = PlanCache::default();
    let mut request = ParsedRequest::new(Method::GET, "/prices?price=12.34&code=17");
    let bound: PriceRequest = materialize(&cache, &mut request).unwrap();
    assert_eq!(bound.price, Cents(1234));
    assert_eq!(bound.code, 17);

    let mut parsers = ParserRegistry::with_defaults();
    parsers.register::<u32, _>(|s| u32::from_str_radix(s.trim(), 16).ok());
    let hex = PlanCache::new(parsers, BindingOptions::default());
    let mut request = ParsedRequest::new(Method::GET, "/prices?price=1.05&code=ff");
    let bound: PriceRequest = materialize(&hex, &mut request).unwrap();
    assert_eq!(bound.price, Cents(105));
    assert_eq!(bound.code, 255);
}

#[test]
fn test_unsupported_type_fails_plan_build() {
    let cache = PlanCache::new(ParserRegistry::empty(), BindingOptions::default());
    let err = cache.get_or_build::<SearchRequest>().unwrap_err();
    assert!(matches!(err, BindingError::UnsupportedType { .. }), "{err:?}");
    assert!(!err.is_client_error());
    assert!(!cache.contains::<SearchRequest>());
}

#[test]
fn test_disabled_inference_skips_unannotated_fields() {
    let cache = PlanCache::new(
        ParserRegistry::with_defaults(),
        BindingOptions {
            enable_inferred_binding: false,
        },
    );
    let mut request = ParsedRequest::new(Method::GET, "/prices?price=12.34&code=17");
    let bound: PriceRequest = materialize(&cache, &mut request).unwrap();
    assert_eq!(bound.price, Cents::default());
    assert_eq!(bound.code, 17);
}

#[test]
fn test_aborted_request_is_cancelled() {
    let cache = PlanCache::default();
    let signal = AbortSignal::new();
    signal.abort();
    let context = HttpContext::new(RequestId::new(), RequestHead::default(), signal);
    let mut request = ParsedRequest::new(Method::POST, "/notes/1")
        .with_header("content-type", "application/json")
        .with_body(br#"{"title":"x"}"#.to_vec());
    let err = Materializer::new(&cache)
        .materialize::<CreateNote, _>(&mut request, &context)
        .unwrap_err();
    assert!(matches!(err, BindingError::Cancelled));
}
