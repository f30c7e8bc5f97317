use proc_macro2::TokenStream;
use quote::quote;
use syn::meta::ParseNestedMeta;
use syn::spanned::Spanned;
use syn::{Attribute, Data, DeriveInput, Error, Expr, Fields, LitStr, Result, Token};

#[derive(Default)]
struct SerdeAttrs {
    rename: Option<String>,
    rename_all: Option<String>,
    skip: bool,
}

fn skip_meta(meta: &ParseNestedMeta) -> Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| skip_meta(&inner))?;
    }
    Ok(())
}

fn serde_attrs(attrs: &[Attribute]) -> Result<SerdeAttrs> {
    let mut out = SerdeAttrs::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") && meta.input.peek(Token![=]) {
                out.rename = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("rename_all") && meta.input.peek(Token![=]) {
                out.rename_all = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_serializing") {
                out.skip = true;
            } else {
                skip_meta(&meta)?;
            }
            Ok(())
        })?;
    }
    Ok(out)
}

fn api_example(attrs: &[Attribute]) -> Result<Option<LitStr>> {
    let mut example = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("api")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("example") {
                example = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("expected `example`"))
            }
        })?;
    }
    Ok(example)
}

/// Apply a serde `rename_all` rule to a snake_case field name.
fn apply_rename_all(rule: &str, field: &str) -> Option<String> {
    let words: Vec<&str> = field.split('_').filter(|w| !w.is_empty()).collect();
    let capitalize = |w: &str| {
        let mut chars = w.chars();
        chars
            .next()
            .map(|c| c.to_uppercase().chain(chars).collect::<String>())
            .unwrap_or_default()
    };
    let renamed = match rule {
        "lowercase" => field.to_lowercase(),
        "UPPERCASE" => field.to_uppercase(),
        "snake_case" => field.to_string(),
        "SCREAMING_SNAKE_CASE" => field.to_uppercase(),
        "kebab-case" => field.replace('_', "-"),
        "SCREAMING-KEBAB-CASE" => field.replace('_', "-").to_uppercase(),
        "PascalCase" => words.iter().map(|w| capitalize(w)).collect(),
        "camelCase" => lower_first(&words.iter().map(|w| capitalize(w)).collect::<String>()),
        _ => return None,
    };
    Some(renamed)
}

fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    chars
        .next()
        .map(|c| c.to_lowercase().chain(chars).collect())
        .unwrap_or_default()
}

pub fn expand_api_schema(input: &DeriveInput) -> Result<TokenStream> {
    let Data::Struct(data) = &input.data else {
        return Err(Error::new(input.span(), "ApiSchema can only be derived for structs"));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(Error::new(data.fields.span(), "ApiSchema needs named fields"));
    };

    let container = serde_attrs(&input.attrs)?;
    let ident = &input.ident;
    let schema_name = container.rename.clone().unwrap_or_else(|| ident.to_string());

    let mut properties = Vec::new();
    for field in &named.named {
        let Some(field_ident) = &field.ident else { continue };
        let attrs = serde_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }
        let field_name = field_ident.to_string().trim_start_matches("r#").to_string();
        let wire_name = match (&attrs.rename, &container.rename_all) {
            (Some(rename), _) => rename.clone(),
            (None, Some(rule)) => apply_rename_all(rule, &field_name).ok_or_else(|| {
                Error::new(input.span(), format!("unsupported rename_all rule '{rule}'"))
            })?,
            (None, None) => lower_first(&field_name),
        };
        let ty = &field.ty;
        let mut property = quote! {
            ::routebind::descriptor::PropertySchema::of::<#ty>(#field_name, #wire_name)
        };
        if let Some(example) = api_example(&field.attrs)? {
            property = quote! { #property.with_example(#example) };
        }
        properties.push(property);
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics ::routebind::descriptor::ApiSchema for #ident #ty_generics #where_clause {
            fn schema_name() -> &'static str {
                #schema_name
            }

            fn properties() -> ::std::vec::Vec<::routebind::descriptor::PropertySchema> {
                ::std::vec![#(#properties),*]
            }
        }

        impl #impl_generics ::routebind::descriptor::SchemaField for #ident #ty_generics #where_clause {
            fn schema_type() -> ::routebind::descriptor::SchemaType {
                ::routebind::descriptor::SchemaType::Object(::routebind::descriptor::object_ref::<Self>())
            }
        }
    })
}

pub fn expand_bindable_enum(input: &DeriveInput) -> Result<TokenStream> {
    let Data::Enum(data) = &input.data else {
        return Err(Error::new(input.span(), "BindableEnum can only be derived for enums"));
    };
    let ident = &input.ident;

    let mut members = Vec::new();
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(Error::new(variant.span(), "BindableEnum variants cannot carry data"));
        }
        let variant_ident = &variant.ident;
        let name = serde_attrs(&variant.attrs)?
            .rename
            .unwrap_or_else(|| variant_ident.to_string());
        members.push(quote! { (#name, #ident::#variant_ident) });
    }

    Ok(quote! {
        impl ::routebind::descriptor::EnumMembers for #ident {
            fn members() -> &'static [(&'static str, Self)] {
                &[#(#members),*]
            }
        }

        impl ::routebind::descriptor::Bindable for #ident {
            fn type_info() -> ::routebind::descriptor::TypeInfo {
                ::routebind::descriptor::TypeInfo::enumeration::<Self>()
            }
        }

        impl ::routebind::descriptor::SchemaField for #ident {
            fn schema_type() -> ::routebind::descriptor::SchemaType {
                ::routebind::descriptor::enum_schema::<Self>()
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rename_all_rules() {
        assert_eq!(apply_rename_all("camelCase", "first_name").as_deref(), Some("firstName"));
        assert_eq!(apply_rename_all("PascalCase", "first_name").as_deref(), Some("FirstName"));
        assert_eq!(apply_rename_all("kebab-case", "first_name").as_deref(), Some("first-name"));
        assert_eq!(
            apply_rename_all("SCREAMING_SNAKE_CASE", "first_name").as_deref(),
            Some("FIRST_NAME")
        );
        assert_eq!(apply_rename_all("Title Case", "first_name"), None);
    }

    #[test]
    fn test_serde_attrs_tolerate_unknown_keys() {
        let input: DeriveInput = syn::parse_quote! {
            #[serde(rename_all = "camelCase", deny_unknown_fields)]
            struct User {
                #[serde(default, rename = "fullName")]
                name: String,
                #[serde(skip)]
                cache: String,
            }
        };
        let tokens = expand_api_schema(&input).unwrap().to_string();
        assert!(tokens.contains("\"fullName\""));
        assert!(!tokens.contains("cache"));
    }

    #[test]
    fn test_enum_with_data_is_rejected() {
        let input: DeriveInput = syn::parse_quote! {
            enum Shape { Circle(f64) }
        };
        assert!(expand_bindable_enum(&input).is_err());
    }
}
