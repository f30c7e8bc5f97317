use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod endpoint;
mod schema;

/// Implement `EndpointRequest` from `#[endpoint(...)]` and `#[bind(...)]` attributes.
///
/// ```rust,ignore
/// #[derive(Debug, Default, EndpointRequest)]
/// #[endpoint(get = "/test/{SampleString}/{RouteInt:int}", name = "sample", group = "Samples")]
/// #[endpoint(produces(status = 200, body = TestModel), filter = ExampleFilter)]
/// pub struct SampleGetRequest {
///     #[bind(name = "SampleString")]
///     pub sample_string: String,
///     #[bind(header, name = "x-tenant")]
///     pub tenant: Option<String>,
///     #[bind(body)]
///     pub user: User,
///     #[bind(skip)]
///     pub computed: String,
/// }
/// ```
///
/// Type attributes: one key per verb (`get`, `post`, `put`, `delete`, `patch`, `head`,
/// `options`, `trace`, `connect`, `any`) taking a template; `name` and `group` for the
/// routes of the same attribute; `produces(status = .., body = Type)`; `filter = expr`;
/// `ignore_api`.
///
/// Field attributes: a source (`route`, `query`, `header`, `form`, `body`, `file`, `skip`),
/// `name = ".."` and `required`. A `name` without a source renames the field for
/// inference. Unannotated fields are inferred.
#[proc_macro_derive(EndpointRequest, attributes(endpoint, bind))]
pub fn derive_endpoint_request(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    endpoint::expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Implement `ApiSchema` and `SchemaField` for a struct with named fields.
///
/// Honours `#[serde(rename = "..")]` on the struct and its fields, `#[serde(rename_all = "..")]`
/// and `#[serde(skip)]`. `#[api(example = "..")]` sets a property example.
#[proc_macro_derive(ApiSchema, attributes(api))]
pub fn derive_api_schema(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    schema::expand_api_schema(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Implement `EnumMembers`, `Bindable` and `SchemaField` for a unit-only enum.
///
/// The enum must be `Copy`. Members are matched by name ignoring ASCII case; a variant's
/// `#[serde(rename = "..")]` replaces its name.
#[proc_macro_derive(BindableEnum)]
pub fn derive_bindable_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    schema::expand_bindable_enum(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
