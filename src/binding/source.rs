//! Where a field's value comes from.

use std::fmt;

use crate::descriptor::FieldMeta;

/// Part of the request a field is bound from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingSource {
    /// Excluded from every kind of binding and from the generated document.
    None,
    Route,
    Query,
    Form,
    Body,
    Header,
    File,
    /// Declared but not understood; binds nothing.
    Unknown,
}

impl BindingSource {
    /// Sources backed by a parsed string value.
    #[must_use]
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            BindingSource::Route | BindingSource::Query | BindingSource::Header | BindingSource::Form
        )
    }
}

impl fmt::Display for BindingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BindingSource::None => "none",
            BindingSource::Route => "route",
            BindingSource::Query => "query",
            BindingSource::Form => "form",
            BindingSource::Body => "body",
            BindingSource::Header => "header",
            BindingSource::File => "file",
            BindingSource::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Explicit binding declared on a field: the source plus an optional key alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindFrom {
    pub source: BindingSource,
    pub name: Option<String>,
    /// Only affects form property nullability in the generated document.
    pub required: bool,
}

macro_rules! source_constructor {
    ($($fn_name:ident => $source:ident),* $(,)?) => {
        $(
            #[must_use]
            pub fn $fn_name() -> Self {
                Self::new(BindingSource::$source)
            }
        )*
    };
}

impl BindFrom {
    #[must_use]
    pub fn new(source: BindingSource) -> Self {
        Self {
            source,
            name: None,
            required: false,
        }
    }

    source_constructor! {
        route => Route,
        query => Query,
        header => Header,
        form => Form,
        body => Body,
        file => File,
        none => None,
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Outcome of resolving a field's binding source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSource {
    /// Explicit `None`: the field takes part in nothing.
    Excluded,
    /// No source; still a candidate for ambient classification.
    Unbound,
    /// Bound from `source` under `key`.
    Bound { source: BindingSource, key: String },
}

impl ResolvedSource {
    #[must_use]
    pub fn source(&self) -> Option<BindingSource> {
        match self {
            ResolvedSource::Bound { source, .. } => Some(*source),
            _ => None,
        }
    }
}

/// Resolve where `field` is bound from, given the route template parameter names in
/// declaration order.
///
/// An explicit declaration always wins. Without one, and with inference enabled, scalar
/// and enum fields bind from the first template parameter whose name matches the field
/// name ignoring ASCII case, or from the query string under the field name.
#[must_use]
pub fn resolve_binding_source(
    field: &FieldMeta,
    template_params: &[String],
    inference_enabled: bool,
) -> ResolvedSource {
    if let Some(binding) = &field.binding {
        if binding.source == BindingSource::None {
            return ResolvedSource::Excluded;
        }
        return ResolvedSource::Bound {
            source: binding.source,
            key: binding.name.clone().unwrap_or_else(|| field.name.to_string()),
        };
    }

    if !inference_enabled || !field.info.shape.is_inferable() {
        return ResolvedSource::Unbound;
    }

    match template_params
        .iter()
        .find(|param| param.eq_ignore_ascii_case(field.name))
    {
        Some(param) => ResolvedSource::Bound {
            source: BindingSource::Route,
            key: param.clone(),
        },
        None => ResolvedSource::Bound {
            source: BindingSource::Query,
            key: field.name.to_string(),
        },
    }
}
