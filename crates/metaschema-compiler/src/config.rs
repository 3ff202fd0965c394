//! Compiler configuration

use crate::xml::EntityMap;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

pub const DEFAULT_MULTIPLEXER_SUFFIX: &str = "Multiplexer";
pub const DEFAULT_EXTENSION: &str = "xml";

/// Settings shared by every family compiled in one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Appended to a declaration name to name its multiplexer (default: `Multiplexer`)
    pub multiplexer_suffix: String,
    /// File extension of schema families during discovery (default: `xml`)
    pub extension: String,
    /// File-name prefixes skipped during discovery
    pub exclude_prefixes: Vec<String>,
    /// Named entity replacements applied while decoding
    pub entities: EntityMap,
    /// Maximum concurrent family compilations (default: one per family)
    pub jobs: Option<usize>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            multiplexer_suffix: DEFAULT_MULTIPLEXER_SUFFIX.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
            exclude_prefixes: Vec::new(),
            entities: EntityMap::new(),
            jobs: None,
        }
    }
}

impl CompilerConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a YAML (`.yaml`/`.yml`) or JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|err| Error::Config {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        let parsed = if is_yaml {
            Self::from_yaml(&content)
        } else {
            Self::from_json(&content)
        };
        let config = parsed.map_err(|message| Error::Config {
            path: path.to_path_buf(),
            message,
        })?;

        debug!("Loaded configuration from {}", path.display());
        config.validate(path)
    }

    pub fn from_yaml(content: &str) -> std::result::Result<Self, String> {
        serde_yaml::from_str(content).map_err(|err| err.to_string())
    }

    pub fn from_json(content: &str) -> std::result::Result<Self, String> {
        serde_json::from_str(content).map_err(|err| err.to_string())
    }

    fn validate(self, path: &Path) -> Result<Self> {
        let message = if self.multiplexer_suffix.is_empty() {
            "multiplexer_suffix must not be empty"
        } else if self.jobs == Some(0) {
            "jobs must be at least 1"
        } else {
            return Ok(self);
        };
        Err(Error::Config {
            path: path.to_path_buf(),
            message: message.to_string(),
        })
    }

    /// Set the multiplexer name suffix
    pub fn multiplexer_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.multiplexer_suffix = suffix.into();
        self
    }

    /// Set the discovery extension
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Skip families whose file name starts with `prefix`
    pub fn exclude_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.exclude_prefixes.push(prefix.into());
        self
    }

    /// Add a named entity replacement
    pub fn entity(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.entities.insert(name.into(), value.into());
        self
    }

    /// Limit concurrent compilations
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }

    /// Whether discovery should skip `file_name`
    pub fn is_excluded(&self, file_name: &str) -> bool {
        self.exclude_prefixes
            .iter()
            .any(|prefix| file_name.starts_with(prefix.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert_eq!(config.multiplexer_suffix, "Multiplexer");
        assert_eq!(config.extension, "xml");
        assert!(config.exclude_prefixes.is_empty());
        assert!(config.entities.is_empty());
        assert_eq!(config.jobs, None);
    }

    #[test]
    fn test_config_builder() {
        let config = CompilerConfig::new()
            .multiplexer_suffix("Mux")
            .extension("msx")
            .exclude_prefix("oscal_complete")
            .entity("company", "Example Corp")
            .jobs(4);

        assert_eq!(config.multiplexer_suffix, "Mux");
        assert_eq!(config.extension, "msx");
        assert!(config.is_excluded("oscal_complete_metaschema.xml"));
        assert!(!config.is_excluded("oscal_catalog_metaschema.xml"));
        assert_eq!(config.entities.get("company").map(String::as_str), Some("Example Corp"));
        assert_eq!(config.jobs, Some(4));
    }

    #[test]
    fn test_from_yaml_partial() {
        let config = CompilerConfig::from_yaml("multiplexer_suffix: Choice\njobs: 2\n").unwrap();
        assert_eq!(config.multiplexer_suffix, "Choice");
        assert_eq!(config.jobs, Some(2));
        assert_eq!(config.extension, "xml");
    }

    #[test]
    fn test_from_json_rejects_unknown_field() {
        assert!(CompilerConfig::from_json(r#"{"suffix": "X"}"#).is_err());
    }

    #[test]
    fn test_from_file_yaml_and_json() {
        let mut yaml = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(yaml, "exclude_prefixes: [draft_]\nentities:\n  org: ACME").unwrap();
        let config = CompilerConfig::from_file(yaml.path()).unwrap();
        assert!(config.is_excluded("draft_model.xml"));
        assert_eq!(config.entities["org"], "ACME");

        let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(json, r#"{{"extension": "msx"}}"#).unwrap();
        let config = CompilerConfig::from_file(json.path()).unwrap();
        assert_eq!(config.extension, "msx");
    }

    #[test]
    fn test_from_file_invalid_values() {
        let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(yaml, "jobs: 0").unwrap();
        let err = CompilerConfig::from_file(yaml.path()).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("jobs"));
    }

    #[test]
    fn test_from_file_missing() {
        let err = CompilerConfig::from_file(Path::new("no/such/config.yaml")).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
