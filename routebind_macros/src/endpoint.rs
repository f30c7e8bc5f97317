use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::spanned::Spanned;
use syn::{Data, DeriveInput, Error, Expr, Fields, GenericArgument, Ident, LitInt, LitStr, PathArguments, Result, Type};

const VERBS: &[&str] = &[
    "get", "post", "put", "delete", "patch", "head", "options", "trace", "connect", "any",
];

const SOURCES: &[&str] = &["route", "query", "header", "form", "body", "file", "skip"];

#[derive(Default)]
struct EndpointAttrs {
    routes: Vec<TokenStream>,
    produces: Vec<(LitInt, Type)>,
    filters: Vec<Expr>,
    ignore_api: bool,
}

#[derive(Default)]
struct BindAttr {
    source: Option<Ident>,
    name: Option<LitStr>,
    required: bool,
}

pub fn expand(input: &DeriveInput) -> Result<TokenStream> {
    let Data::Struct(data) = &input.data else {
        return Err(Error::new(input.span(), "EndpointRequest can only be derived for structs"));
    };
    let fields = match &data.fields {
        Fields::Named(named) => named.named.iter().collect::<Vec<_>>(),
        Fields::Unit => Vec::new(),
        Fields::Unnamed(_) => {
            return Err(Error::new(data.fields.span(), "EndpointRequest needs named fields"));
        }
    };

    let attrs = parse_endpoint_attrs(input)?;
    let mut steps = Vec::new();
    for route in &attrs.routes {
        steps.push(quote! { .route(#route) });
    }

    for field in fields {
        let Some(ident) = &field.ident else { continue };
        let bind = parse_bind_attr(field)?;
        let field_name = ident.to_string().trim_start_matches("r#").to_string();
        let accessor = quote! { |r| &mut r.#ident };

        let Some(source) = &bind.source else {
            if bind.required {
                return Err(Error::new(ident.span(), "`required` needs a binding source"));
            }
            let name = bind.name.as_ref().map_or_else(|| quote!(#field_name), |n| quote!(#n));
            steps.push(quote! { .field(#name, #accessor) });
            continue;
        };

        if source == "skip" {
            continue;
        }
        if source == "body" && !is_file_type(&field.ty) {
            steps.push(quote! { .body(#field_name, #accessor) });
            continue;
        }

        let mut binding = quote! { ::routebind::binding::BindFrom::#source() };
        if let Some(name) = &bind.name {
            binding = quote! { #binding.named(#name) };
        }
        if bind.required {
            binding = quote! { #binding.required() };
        }
        steps.push(quote! { .bind(#field_name, #binding, #accessor) });
    }

    for (status, body) in &attrs.produces {
        steps.push(quote! { .produces::<#body>(#status) });
    }
    for filter in &attrs.filters {
        steps.push(quote! { .filter(#filter) });
    }
    if attrs.ignore_api {
        steps.push(quote! { .ignore_api() });
    }

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics ::routebind::descriptor::EndpointRequest for #ident #ty_generics #where_clause {
            fn descriptor() -> ::routebind::descriptor::RequestDescriptor<Self> {
                ::routebind::descriptor::RequestDescriptor::<Self>::new()
                    #(#steps)*
            }
        }
    })
}

fn parse_endpoint_attrs(input: &DeriveInput) -> Result<EndpointAttrs> {
    let mut attrs = EndpointAttrs::default();
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("endpoint")) {
        let mut routes: Vec<(Ident, LitStr)> = Vec::new();
        let mut name: Option<LitStr> = None;
        let mut group: Option<LitStr> = None;

        attr.parse_nested_meta(|meta| {
            if let Some(verb) = VERBS.iter().copied().find(|v| meta.path.is_ident(*v)) {
                let template: LitStr = meta.value()?.parse()?;
                routes.push((format_ident!("{}", verb), template));
                return Ok(());
            }
            if meta.path.is_ident("name") {
                name = Some(meta.value()?.parse()?);
                return Ok(());
            }
            if meta.path.is_ident("group") {
                group = Some(meta.value()?.parse()?);
                return Ok(());
            }
            if meta.path.is_ident("ignore_api") {
                attrs.ignore_api = true;
                return Ok(());
            }
            if meta.path.is_ident("filter") {
                attrs.filters.push(meta.value()?.parse()?);
                return Ok(());
            }
            if meta.path.is_ident("produces") {
                let mut status: Option<LitInt> = None;
                let mut body: Option<Type> = None;
                meta.parse_nested_meta(|inner| {
                    if inner.path.is_ident("status") {
                        status = Some(inner.value()?.parse()?);
                        Ok(())
                    } else if inner.path.is_ident("body") {
                        body = Some(inner.value()?.parse()?);
                        Ok(())
                    } else {
                        Err(inner.error("expected `status` or `body`"))
                    }
                })?;
                return match (status, body) {
                    (Some(status), Some(body)) => {
                        attrs.produces.push((status, body));
                        Ok(())
                    }
                    _ => Err(meta.error("`produces` needs `status` and `body`")),
                };
            }
            Err(meta.error("unknown endpoint attribute"))
        })?;

        if routes.is_empty() && (name.is_some() || group.is_some()) {
            return Err(Error::new(
                attr.span(),
                "`name` and `group` apply to routes declared in the same attribute",
            ));
        }
        for (verb, template) in routes {
            let mut route = quote! { ::routebind::route::RouteTemplate::#verb(#template) };
            if let Some(name) = &name {
                route = quote! { #route.named(#name) };
            }
            if let Some(group) = &group {
                route = quote! { #route.grouped(#group) };
            }
            attrs.routes.push(route);
        }
    }
    Ok(attrs)
}

fn parse_bind_attr(field: &syn::Field) -> Result<BindAttr> {
    let mut bind = BindAttr::default();
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("bind")) {
        attr.parse_nested_meta(|meta| {
            if let Some(source) = SOURCES.iter().copied().find(|s| meta.path.is_ident(*s)) {
                if bind.source.is_some() {
                    return Err(meta.error("a field has one binding source"));
                }
                bind.source = Some(format_ident!("{}", source));
                return Ok(());
            }
            if meta.path.is_ident("name") {
                bind.name = Some(meta.value()?.parse()?);
                return Ok(());
            }
            if meta.path.is_ident("required") {
                bind.required = true;
                return Ok(());
            }
            Err(meta.error("expected a source, `name` or `required`"))
        })?;
    }
    Ok(bind)
}

/// `UploadedFile` / `UploadedFiles`, optionally inside `Option`.
fn is_file_type(ty: &Type) -> bool {
    let Type::Path(path) = ty else { return false };
    let Some(last) = path.path.segments.last() else { return false };
    if last.ident == "Option" {
        if let PathArguments::AngleBracketed(args) = &last.arguments {
            if let Some(GenericArgument::Type(inner)) = args.args.first() {
                return is_file_type(inner);
            }
        }
        return false;
    }
    last.ident == "UploadedFile" || last.ident == "UploadedFiles"
}
