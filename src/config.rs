//! Configuration management for schema-graph
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (schema-graph.toml)
//! - Environment variables (SCHEMA_GRAPH__*)
//!
//! ## Example config file (schema-graph.toml):
//! ```toml
//! [loader]
//! strict = false
//! default_draft = "draft7"
//! drafts = ["draft4", "draft6", "draft7"]
//! max_ref_hops = 10
//!
//! [output]
//! format = "pretty"
//! include_extra_properties = true
//! draft = "draft7"
//!
//! [documents]
//! directory = "./schemas"
//! base_uri = "http://example.com/schemas/"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

use crate::document::InMemoryDocumentClient;
use crate::draft::{JsonSchemaVersion, VersionSet};
use crate::error::Result;
use crate::keyword::project::SerializeOptions;
use crate::loader::{LoaderConfig, DEFAULT_MAX_REF_HOPS};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Loading policy
    #[serde(default)]
    pub loader: LoaderSettings,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Document sources
    #[serde(default)]
    pub documents: DocumentsConfig,
}

/// Loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderSettings {
    /// Reject unknown keywords and malformed values
    #[serde(default)]
    pub strict: bool,

    /// Draft assumed when `$schema` is absent or unknown
    #[serde(default = "default_draft")]
    pub default_draft: JsonSchemaVersion,

    /// Drafts whose keywords are understood when `$schema` is absent
    #[serde(default = "default_drafts")]
    pub drafts: Vec<JsonSchemaVersion>,

    /// Longest chain of `$ref` hops before loading fails
    #[serde(default = "default_max_ref_hops")]
    pub max_ref_hops: usize,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output format (pretty or compact)
    #[serde(default = "default_output_format")]
    pub format: OutputFormat,

    /// Write non-keyword properties back out
    #[serde(default = "default_true")]
    pub include_extra_properties: bool,

    /// Draft to render; defaults to each schema's own draft
    #[serde(default)]
    pub draft: Option<JsonSchemaVersion>,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

/// Where referenced documents come from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentsConfig {
    /// Directory of `*.json` documents to make resolvable
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// URI the directory is published under
    #[serde(default)]
    pub base_uri: Option<String>,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_draft() -> JsonSchemaVersion {
    JsonSchemaVersion::latest()
}

fn default_drafts() -> Vec<JsonSchemaVersion> {
    JsonSchemaVersion::ALL.to_vec()
}

fn default_max_ref_hops() -> usize {
    DEFAULT_MAX_REF_HOPS
}

fn default_output_format() -> OutputFormat {
    OutputFormat::Pretty
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            strict: false,
            default_draft: default_draft(),
            drafts: default_drafts(),
            max_ref_hops: default_max_ref_hops(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Pretty,
            include_extra_properties: true,
            draft: None,
        }
    }
}

impl GraphConfig {
    /// Load configuration from default locations
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = [
            "schema-graph.toml",
            ".schema-graph.toml",
            "config/schema-graph.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "schema-graph") {
            let xdg_config = config_dir.config_dir().join("schema-graph.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (SCHEMA_GRAPH__*)
        builder = builder.add_source(
            Environment::with_prefix("SCHEMA_GRAPH")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Loading policy for [`crate::SchemaLoader`]
    pub fn loader_config(&self) -> LoaderConfig {
        let versions: VersionSet = self.loader.drafts.iter().copied().collect();
        LoaderConfig {
            strict: self.loader.strict,
            default_version: self.loader.default_draft,
            versions: if versions.is_empty() { VersionSet::all() } else { versions },
            max_ref_hops: self.loader.max_ref_hops,
        }
    }

    pub fn serialize_options(&self) -> SerializeOptions {
        SerializeOptions {
            include_extra_properties: self.output.include_extra_properties,
        }
    }

    /// Document client over the configured directory, if any
    pub fn document_client(&self) -> Result<Option<InMemoryDocumentClient>> {
        let Some(directory) = &self.documents.directory else {
            return Ok(None);
        };
        let base = match &self.documents.base_uri {
            Some(uri) => Url::parse(uri)?,
            None => directory_uri(directory)?,
        };
        InMemoryDocumentClient::from_directory(directory, &base).map(Some)
    }
}

/// `file://` URI of a directory, with the trailing slash relative joins need
pub fn directory_uri(directory: &std::path::Path) -> Result<Url> {
    let absolute = if directory.is_absolute() {
        directory.to_path_buf()
    } else {
        std::env::current_dir()?.join(directory)
    };
    Url::from_directory_path(&absolute).map_err(|_| {
        crate::error::SchemaError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} is not a usable directory path", absolute.display()),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GraphConfig::default();
        assert!(!config.loader.strict);
        assert_eq!(config.loader.max_ref_hops, 10);
        assert_eq!(config.output.format, OutputFormat::Pretty);
        assert!(config.document_client().unwrap().is_none());
    }

    #[test]
    fn test_serialize_config() {
        let config = GraphConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[loader]"));
        assert!(toml_str.contains("[output]"));
        assert!(toml_str.contains("default_draft = \"draft7\""));
    }

    #[test]
    fn test_loader_config_from_settings() {
        let mut config = GraphConfig::default();
        config.loader.strict = true;
        config.loader.drafts = vec![JsonSchemaVersion::Draft4];
        config.loader.max_ref_hops = 3;

        let loader = config.loader_config();
        assert!(loader.strict);
        assert_eq!(loader.versions, VersionSet::only(JsonSchemaVersion::Draft4));
        assert_eq!(loader.max_ref_hops, 3);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[loader]\nstrict = true\nmax_ref_hops = 4\n\n[output]\nformat = \"compact\"\n",
        )
        .unwrap();

        let config = GraphConfig::load_from(path.to_str()).unwrap();
        assert!(config.loader.strict);
        assert_eq!(config.loader.max_ref_hops, 4);
        assert_eq!(config.output.format, OutputFormat::Compact);
        assert!(config.output.include_extra_properties);
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = GraphConfig::default();
        config.output.draft = Some(JsonSchemaVersion::Draft4);
        config.save(path.to_str().unwrap()).unwrap();

        let loaded = GraphConfig::load_from(path.to_str()).unwrap();
        assert_eq!(loaded.output.draft, Some(JsonSchemaVersion::Draft4));
    }
}
