//! # Route Templates
//!
//! A [`RouteTemplate`] is the record an endpoint request type attaches to itself to say
//! "serve me at this path for these methods". One type may carry several.
//!
//! ## Template syntax
//!
//! Templates are `/`-separated segments. A segment is either literal text or a single
//! parameter wrapped in braces:
//!
//! | Segment | Meaning |
//! |---------|---------|
//! | `users` | literal, matched case-insensitively |
//! | `{id}` | required parameter |
//! | `{id:int}` | parameter with a constraint (`int`, `long`, `bool`, `guid`, `alpha`) |
//! | `{id?}` | optional trailing parameter |
//! | `{*rest}` | catch-all, swallows the remainder of the path |
//!
//! Rendering a template for OpenAPI drops constraints and modifiers: `/test/{RouteInt:int}`
//! renders as `/test/{RouteInt}`.

use http::Method;
use std::fmt;

/// Which HTTP methods a route answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodSet {
    /// Every method.
    Any,
    /// Only the listed methods, in declaration order.
    Only(Vec<Method>),
}

impl MethodSet {
    #[must_use]
    pub fn contains(&self, method: &Method) -> bool {
        match self {
            MethodSet::Any => true,
            MethodSet::Only(methods) => methods.contains(method),
        }
    }

    /// First declared method; `None` for [`MethodSet::Any`].
    #[must_use]
    pub fn first(&self) -> Option<&Method> {
        match self {
            MethodSet::Any => None,
            MethodSet::Only(methods) => methods.first(),
        }
    }
}

impl fmt::Display for MethodSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodSet::Any => f.write_str("ANY"),
            MethodSet::Only(methods) => {
                let names: Vec<&str> = methods.iter().map(Method::as_str).collect();
                f.write_str(&names.join(","))
            }
        }
    }
}

/// One route declaration: methods, path template, optional display name and group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTemplate {
    pub methods: MethodSet,
    pub template: String,
    pub name: Option<String>,
    pub group: Option<String>,
}

macro_rules! verb_constructor {
    ($($fn_name:ident => $method:ident),* $(,)?) => {
        $(
            #[doc = concat!("`", stringify!($method), "` route.")]
            #[must_use]
            pub fn $fn_name(template: impl Into<String>) -> Self {
                Self::with_methods([Method::$method], template)
            }
        )*
    };
}

impl RouteTemplate {
    verb_constructor! {
        get => GET,
        post => POST,
        put => PUT,
        delete => DELETE,
        patch => PATCH,
        head => HEAD,
        options => OPTIONS,
        trace => TRACE,
        connect => CONNECT,
    }

    /// Route answering every method.
    #[must_use]
    pub fn any(template: impl Into<String>) -> Self {
        Self {
            methods: MethodSet::Any,
            template: template.into(),
            name: None,
            group: None,
        }
    }

    #[must_use]
    pub fn with_methods(
        methods: impl IntoIterator<Item = Method>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            methods: MethodSet::Only(methods.into_iter().collect()),
            template: template.into(),
            name: None,
            group: None,
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn grouped(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Parsed segments of the template.
    #[must_use]
    pub fn segments(&self) -> Vec<Segment> {
        parse_template(&self.template)
    }

    /// Parameter names in declaration order.
    #[must_use]
    pub fn parameter_names(&self) -> Vec<String> {
        self.segments()
            .into_iter()
            .filter_map(|s| match s {
                Segment::Parameter(p) => Some(p.name),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Template rendered in OpenAPI path form (`/users/{id}`).
    #[must_use]
    pub fn render(&self) -> String {
        let segments = self.segments();
        if segments.is_empty() {
            return "/".to_string();
        }
        let mut route = String::new();
        for segment in segments {
            route.push('/');
            match segment {
                Segment::Literal(text) => route.push_str(&text),
                Segment::Parameter(p) => {
                    route.push('{');
                    route.push_str(&p.name);
                    route.push('}');
                }
            }
        }
        route
    }
}

/// A parsed template segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Parameter(TemplateParameter),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateParameter {
    pub name: String,
    pub constraint: Option<String>,
    pub optional: bool,
    pub catch_all: bool,
}

/// Split a template into segments. Never fails: anything that is not a well-formed
/// `{...}` parameter is literal text.
#[must_use]
pub fn parse_template(template: &str) -> Vec<Segment> {
    template
        .trim_start_matches('~')
        .split('/')
        .filter(|s| !s.is_empty())
        .map(parse_segment)
        .collect()
}

fn parse_segment(segment: &str) -> Segment {
    let Some(inner) = segment
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .filter(|s| !s.contains('{') && !s.contains('}'))
    else {
        return Segment::Literal(segment.to_string());
    };

    let (catch_all, inner) = match inner.strip_prefix("**").or_else(|| inner.strip_prefix('*')) {
        Some(rest) => (true, rest),
        None => (false, inner),
    };
    // `{name=default}` carries a default value; treat it as optional.
    let (inner, has_default) = match inner.split_once('=') {
        Some((name, _)) => (name, true),
        None => (inner, false),
    };
    let (inner, optional) = match inner.strip_suffix('?') {
        Some(rest) => (rest, true),
        None => (inner, has_default),
    };
    let (name, constraint) = match inner.split_once(':') {
        Some((name, constraint)) => (name, Some(constraint.to_string())),
        None => (inner, None),
    };

    Segment::Parameter(TemplateParameter {
        name: name.trim().to_string(),
        constraint,
        optional,
        catch_all,
    })
}
