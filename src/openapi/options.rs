//! Options for document generation.

use oas3::spec::{SecurityRequirement, SecurityScheme};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::descriptor::EndpointMetadata;

/// Computes the tag (group) of an operation.
pub type GroupNaming = Arc<dyn Fn(&EndpointMetadata, &SchemaGeneratorOptions) -> String + Send + Sync>;

/// `info` block of the generated document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    pub title: String,
    pub version: String,
    pub description: Option<String>,
}

impl Default for DocumentInfo {
    fn default() -> Self {
        Self {
            title: "API".to_string(),
            version: "1.0.0".to_string(),
            description: None,
        }
    }
}

/// Generator settings: document info, security and group naming.
#[derive(Clone, Default)]
pub struct SchemaGeneratorOptions {
    pub info: DocumentInfo,
    /// Named security schemes, emitted in name order.
    pub security_schemes: BTreeMap<String, SecurityScheme>,
    /// Security requirements in declaration order.
    pub security_requirements: Vec<SecurityRequirement>,
    pub group_naming: Option<GroupNaming>,
}

impl fmt::Debug for SchemaGeneratorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaGeneratorOptions")
            .field("info", &self.info)
            .field("security_schemes", &self.security_schemes.keys().collect::<Vec<_>>())
            .field("security_requirements", &self.security_requirements.len())
            .field("group_naming", &self.group_naming.is_some())
            .finish()
    }
}

impl SchemaGeneratorOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_info(mut self, title: impl Into<String>, version: impl Into<String>) -> Self {
        self.info.title = title.into();
        self.info.version = version.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.info.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn add_security_scheme(mut self, name: impl Into<String>, scheme: SecurityScheme) -> Self {
        self.security_schemes.insert(name.into(), scheme);
        self
    }

    #[must_use]
    pub fn add_security_requirement(mut self, requirement: SecurityRequirement) -> Self {
        self.security_requirements.push(requirement);
        self
    }

    /// `"Bearer": {type: http, scheme: bearer}`.
    #[must_use]
    pub fn add_default_bearer_scheme(self) -> Self {
        self.add_security_scheme(
            "Bearer",
            SecurityScheme::Http {
                description: Some("Bearer token in the Authorization header".to_string()),
                scheme: "bearer".to_string(),
                bearer_format: None,
            },
        )
    }

    /// `{"Bearer": []}`.
    #[must_use]
    pub fn add_default_security_requirement(self) -> Self {
        let mut requirement = BTreeMap::new();
        requirement.insert("Bearer".to_string(), Vec::new());
        self.add_security_requirement(SecurityRequirement(requirement))
    }

    #[must_use]
    pub fn with_group_naming<F>(mut self, naming: F) -> Self
    where
        F: Fn(&EndpointMetadata, &SchemaGeneratorOptions) -> String + Send + Sync + 'static,
    {
        self.group_naming = Some(Arc::new(naming));
        self
    }

    /// Tag for an endpoint: the configured convention, else the namespace with its first
    /// segment dropped, else the type's simple name.
    #[must_use]
    pub fn group_name(&self, metadata: &EndpointMetadata) -> String {
        if let Some(naming) = &self.group_naming {
            return naming(metadata, self);
        }
        default_group_name(metadata)
    }
}

fn default_group_name(metadata: &EndpointMetadata) -> String {
    let remainder = metadata
        .namespace()
        .split_once("::")
        .map_or("", |(_, rest)| rest);
    if remainder.is_empty() {
        metadata.simple_name().to_string()
    } else {
        remainder.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::RequestDescriptor;

    #[derive(Default)]
    struct Probe;

    fn metadata() -> EndpointMetadata {
        RequestDescriptor::<Probe>::new().metadata().clone()
    }

    #[test]
    fn test_default_group_drops_crate_segment() {
        // routebind::openapi::options::tests::Probe
        assert_eq!(
            SchemaGeneratorOptions::new().group_name(&metadata()),
            "openapi::options::tests"
        );
    }

    #[test]
    fn test_custom_group_naming() {
        let options = SchemaGeneratorOptions::new()
            .with_info("Sample", "v1")
            .with_group_naming(|m, o| format!("{}-{}", o.info.title, m.simple_name()));
        assert_eq!(options.group_name(&metadata()), "Sample-Probe");
    }

    #[test]
    fn test_default_bearer() {
        let options = SchemaGeneratorOptions::new()
            .add_default_bearer_scheme()
            .add_default_security_requirement();
        assert!(options.security_schemes.contains_key("Bearer"));
        assert_eq!(options.security_requirements[0].0.get("Bearer"), Some(&Vec::new()));
    }
}
