//! Router core: template compilation and request matching.

use http::Method;
use regex::Regex;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::route::{MethodSet, RouteTemplate, Segment, TemplateParameter};

/// Maximum number of route values before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Route values extracted from a matched path, in template order.
///
/// Names are `Arc<str>` shared with the compiled route; values are per-request.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Maximum number of headers before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Request headers as (lowercased name, value) pairs; repeated headers stay repeated.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Result of matching a request against the routing table.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// Index of the endpoint the matched route was registered for.
    pub endpoint: usize,
    /// The template as declared (e.g. `/test/{RouteInt:int}`).
    pub template: Arc<str>,
    /// Values captured from the path, percent-decoded.
    pub route_values: ParamVec,
}

impl RouteMatch {
    /// Case-insensitive lookup; the last capture with the name wins.
    #[must_use]
    pub fn route_value(&self, name: &str) -> Option<&str> {
        self.route_values
            .iter()
            .rfind(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug)]
struct CompiledRoute {
    methods: MethodSet,
    template: Arc<str>,
    regex: Regex,
    param_names: Vec<Arc<str>>,
    precedence: Vec<u8>,
    endpoint: usize,
}

/// Method + path matcher over compiled [`RouteTemplate`]s.
///
/// Routes are tried most-specific first: at each segment a literal beats a constrained
/// parameter, which beats a plain parameter, then optional, then catch-all. Routes of
/// equal precedence keep registration order.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<CompiledRoute>,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `route` and register it for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns the regex error if a compiled template is not a valid pattern, which can
    /// only happen for unknown constraint syntax that leaks into the pattern.
    pub fn add(&mut self, route: &RouteTemplate, endpoint: usize) -> Result<(), regex::Error> {
        let segments = route.segments();
        let (regex, param_names) = Self::template_to_regex(&segments)?;
        let precedence = segments.iter().map(segment_rank).collect();

        info!(
            methods = %route.methods,
            template = %route.template,
            endpoint = endpoint,
            params = ?param_names,
            "Route registered"
        );

        self.routes.push(CompiledRoute {
            methods: route.methods.clone(),
            template: Arc::from(route.template.as_str()),
            regex,
            param_names,
            precedence,
            endpoint,
        });
        self.routes.sort_by(|a, b| a.precedence.cmp(&b.precedence));
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Match `method` and `path` (without query string).
    #[must_use]
    pub fn route(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        debug!(method = %method, path = %path, "Route match attempt");

        for route in &self.routes {
            if !route.methods.contains(method) {
                continue;
            }
            let Some(captures) = route.regex.captures(path) else {
                continue;
            };

            let mut route_values = ParamVec::new();
            for (idx, name) in route.param_names.iter().enumerate() {
                if let Some(raw) = captures.get(idx + 1) {
                    if raw.as_str().is_empty() {
                        continue;
                    }
                    let value = urlencoding::decode(raw.as_str())
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| raw.as_str().to_string());
                    route_values.push((Arc::clone(name), value));
                }
            }

            debug!(
                method = %method,
                path = %path,
                template = %route.template,
                route_values = ?route_values,
                "Route matched"
            );

            return Some(RouteMatch {
                endpoint: route.endpoint,
                template: Arc::clone(&route.template),
                route_values,
            });
        }

        warn!(method = %method, path = %path, "No route matched");
        None
    }

    /// Methods registered for routes whose path matches, for `405` responses.
    #[must_use]
    pub fn allowed_methods(&self, path: &str) -> Vec<String> {
        let mut allowed = Vec::new();
        for route in self.routes.iter().filter(|r| r.regex.is_match(path)) {
            let name = route.methods.to_string();
            if !allowed.contains(&name) {
                allowed.push(name);
            }
        }
        allowed
    }

    /// Convert parsed template segments to an anchored, case-insensitive regex and the
    /// ordered parameter names.
    ///
    /// `/users/{id:int}` becomes `(?i)^/users/(-?[0-9]+)$` with `["id"]`.
    pub(crate) fn template_to_regex(
        segments: &[Segment],
    ) -> Result<(Regex, Vec<Arc<str>>), regex::Error> {
        if segments.is_empty() {
            return Ok((Regex::new(r"^/?$")?, Vec::new()));
        }

        let mut pattern = String::from("(?i)^");
        let mut param_names = Vec::new();

        for segment in segments {
            match segment {
                Segment::Literal(text) => {
                    pattern.push('/');
                    pattern.push_str(&regex::escape(text));
                }
                Segment::Parameter(param) if param.catch_all => {
                    pattern.push_str("(?:/(.*))?");
                    param_names.push(Arc::from(param.name.as_str()));
                }
                Segment::Parameter(param) => {
                    let class = constraint_class(param);
                    if param.optional {
                        pattern.push_str(&format!("(?:/({class}))?"));
                    } else {
                        pattern.push_str(&format!("/({class})"));
                    }
                    param_names.push(Arc::from(param.name.as_str()));
                }
            }
        }

        pattern.push_str("/?$");
        Ok((Regex::new(&pattern)?, param_names))
    }
}

fn constraint_class(param: &TemplateParameter) -> &'static str {
    match param.constraint.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("int" | "long") => "-?[0-9]+",
        Some("bool") => "true|false",
        Some("guid") => "[0-9a-fA-F]{8}-?[0-9a-fA-F]{4}-?[0-9a-fA-F]{4}-?[0-9a-fA-F]{4}-?[0-9a-fA-F]{12}",
        Some("alpha") => "[A-Za-z]+",
        _ => "[^/]+",
    }
}

fn segment_rank(segment: &Segment) -> u8 {
    match segment {
        Segment::Literal(_) => 0,
        Segment::Parameter(p) if p.catch_all => 4,
        Segment::Parameter(p) if p.optional => 3,
        Segment::Parameter(p) if p.constraint.is_some() => 1,
        Segment::Parameter(_) => 2,
    }
}
