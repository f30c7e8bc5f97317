//! # Configuration
//!
//! [`RouteBindConfig`] holds the switches that shape binding, plan building, the served
//! OpenAPI route and the handler coroutines. It loads from YAML and every field can be
//! overridden from the environment:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `ROUTEBIND_INFERRED_BINDING` | `enable_inferred_binding` |
//! | `ROUTEBIND_EAGER_PLANS` | `build_plans_eagerly` |
//! | `ROUTEBIND_OPENAPI_PATH` | `openapi_path` |
//! | `ROUTEBIND_DOCS_DIR` | `docs_dir` |
//! | `ROUTEBIND_STACK_SIZE` | `handler_stack_size` (decimal or `0x` hex) |
//!
//! ```yaml
//! enable_inferred_binding: true
//! build_plans_eagerly: true
//! openapi_path: /openapi.json
//! docs_dir: ./docs
//! handler_stack_size: 0x10000
//! ```

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::binding::BindingOptions;
use crate::dispatcher::DEFAULT_STACK_SIZE;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RouteBindConfig {
    /// Infer route/query sources for fields without an explicit binding.
    pub enable_inferred_binding: bool,
    /// Build every binding plan when endpoints are mapped instead of on first request.
    pub build_plans_eagerly: bool,
    /// Route serving the generated OpenAPI document.
    pub openapi_path: String,
    /// Directory holding `<module>.xml` documentation files.
    pub docs_dir: Option<PathBuf>,
    /// Stack size in bytes for handler coroutines.
    #[serde(deserialize_with = "deserialize_stack_size")]
    pub handler_stack_size: usize,
}

impl Default for RouteBindConfig {
    fn default() -> Self {
        Self {
            enable_inferred_binding: true,
            build_plans_eagerly: false,
            openapi_path: "/openapi.json".to_string(),
            docs_dir: None,
            handler_stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl RouteBindConfig {
    /// Load from a YAML file, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, [`ConfigError::Yaml`] if it does not
    /// parse.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml_str(&text)?;
        config.apply_env();
        debug!(path = %path.display(), ?config, "Configuration loaded");
        Ok(config)
    }

    /// Parse YAML without consulting the environment.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Yaml`] if the text does not parse.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(ConfigError::Yaml)
    }

    /// Defaults with environment overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from `lookup`. Values that do not parse are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("ROUTEBIND_INFERRED_BINDING") {
            match parse_flag(&value) {
                Some(flag) => self.enable_inferred_binding = flag,
                None => warn!(variable = "ROUTEBIND_INFERRED_BINDING", value = %value, "Ignoring invalid flag"),
            }
        }
        if let Some(value) = lookup("ROUTEBIND_EAGER_PLANS") {
            match parse_flag(&value) {
                Some(flag) => self.build_plans_eagerly = flag,
                None => warn!(variable = "ROUTEBIND_EAGER_PLANS", value = %value, "Ignoring invalid flag"),
            }
        }
        if let Some(value) = lookup("ROUTEBIND_OPENAPI_PATH") {
            if value.starts_with('/') {
                self.openapi_path = value;
            } else {
                warn!(variable = "ROUTEBIND_OPENAPI_PATH", value = %value, "Path must start with '/'");
            }
        }
        if let Some(value) = lookup("ROUTEBIND_DOCS_DIR") {
            self.docs_dir = (!value.is_empty()).then(|| PathBuf::from(value));
        }
        if let Some(value) = lookup("ROUTEBIND_STACK_SIZE") {
            match parse_stack_size(&value) {
                Some(size) => self.handler_stack_size = size,
                None => warn!(variable = "ROUTEBIND_STACK_SIZE", value = %value, "Ignoring invalid stack size"),
            }
        }
    }

    #[must_use]
    pub fn binding_options(&self) -> BindingOptions {
        BindingOptions {
            enable_inferred_binding: self.enable_inferred_binding,
        }
    }
}

/// Decimal or `0x` hexadecimal byte count.
#[must_use]
pub fn parse_stack_size(value: &str) -> Option<usize> {
    let value = value.trim();
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn deserialize_stack_size<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(usize),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(text) => parse_stack_size(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid stack size '{text}'"))),
    }
}

/// Startup configuration failures.
#[derive(Debug)]
pub enum ConfigError {
    /// `map_all_requests` was called without an endpoint module.
    MissingModule,
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Yaml(serde_yaml::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingModule => write!(
                f,
                "No endpoint module configured; call with_module before map_all_requests"
            ),
            ConfigError::Io { path, source } => {
                write!(f, "Failed to read config '{}': {source}", path.display())
            }
            ConfigError::Yaml(err) => write!(f, "Invalid config: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Yaml(err) => Some(err),
            ConfigError::MissingModule => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RouteBindConfig::default();
        assert!(config.enable_inferred_binding);
        assert!(!config.build_plans_eagerly);
        assert_eq!(config.openapi_path, "/openapi.json");
        assert_eq!(config.handler_stack_size, 0x10000);
        assert!(config.binding_options().enable_inferred_binding);
    }

    #[test]
    fn test_yaml_partial_and_hex_stack() {
        let config = RouteBindConfig::from_yaml_str(
            "build_plans_eagerly: true\nhandler_stack_size: \"0x8000\"\n",
        )
        .unwrap();
        assert!(config.build_plans_eagerly);
        assert!(config.enable_inferred_binding);
        assert_eq!(config.handler_stack_size, 0x8000);

        let config = RouteBindConfig::from_yaml_str("handler_stack_size: 32768").unwrap();
        assert_eq!(config.handler_stack_size, 32768);
        assert_eq!(RouteBindConfig::from_yaml_str("").unwrap(), RouteBindConfig::default());
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let err = RouteBindConfig::from_yaml_str("openapi_path: [1, 2").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "openapi_path: /swagger.json").unwrap();
        let config = RouteBindConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.openapi_path, "/swagger.json");

        let missing = RouteBindConfig::from_yaml_file("/does/not/exist.yaml").unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ROUTEBIND_INFERRED_BINDING", "false"),
            ("ROUTEBIND_EAGER_PLANS", "1"),
            ("ROUTEBIND_OPENAPI_PATH", "no-slash"),
            ("ROUTEBIND_DOCS_DIR", "/srv/docs"),
            ("ROUTEBIND_STACK_SIZE", "0x4000"),
        ]
        .into_iter()
        .collect();
        let mut config = RouteBindConfig::default();
        config.apply_overrides(|name| vars.get(name).map(|v| (*v).to_string()));
        assert!(!config.enable_inferred_binding);
        assert!(config.build_plans_eagerly);
        assert_eq!(config.openapi_path, "/openapi.json");
        assert_eq!(config.docs_dir, Some(PathBuf::from("/srv/docs")));
        assert_eq!(config.handler_stack_size, 0x4000);
    }

    #[test]
    fn test_parse_stack_size() {
        assert_eq!(parse_stack_size("16384"), Some(16384));
        assert_eq!(parse_stack_size("0x4000"), Some(0x4000));
        assert_eq!(parse_stack_size("lots"), None);
    }
}
