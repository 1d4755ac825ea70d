//! Structured file formats understood by both stores.

use crate::error::{ConfigError, Result};
use config::{Map, Value, ValueKind};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Format of a configuration document, local or remote.
///
/// Parsing goes through the `config` crate; serialization (used when writing
/// the last known-good configuration back to disk) goes through the matching
/// serde backend so the file keeps the format it was loaded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    /// YAML (`yaml`, `yml`)
    Yaml,
    /// JSON (`json`)
    Json,
    /// TOML (`toml`)
    Toml,
}

impl FileFormat {
    /// Resolve a format from a file type name such as `"yaml"` or `"json"`.
    ///
    /// Matching is case-insensitive and tolerates a leading dot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRequest`] for unsupported types.
    pub fn from_type(file_type: &str) -> Result<Self> {
        match file_type.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            "toml" => Ok(Self::Toml),
            other => Err(ConfigError::InvalidRequest(format!(
                "Unsupported file type: {}. Supported: yaml, yml, json, toml",
                other
            ))),
        }
    }

    /// Resolve a format from a path's extension.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRequest`] if the path has no extension or
    /// the extension is not supported.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                ConfigError::InvalidRequest(format!(
                    "Unable to determine file format for: {}",
                    path.display()
                ))
            })?;
        Self::from_type(extension)
    }

    /// Canonical file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Toml => "toml",
        }
    }

    fn as_config_format(&self) -> config::FileFormat {
        match self {
            Self::Yaml => config::FileFormat::Yaml,
            Self::Json => config::FileFormat::Json,
            Self::Toml => config::FileFormat::Toml,
        }
    }

    /// Parse raw text into a generic key/value tree.
    ///
    /// Keys keep the spelling they have in the document; matching them to
    /// fields happens when the tree is deserialized.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseFailure`] if the text is not valid in this format.
    pub fn parse_tree(&self, text: &str) -> Result<Value> {
        let parsed = config::Config::builder()
            .add_source(config::File::from_str(text, self.as_config_format()))
            .build()
            .map_err(|e| ConfigError::ParseFailure(format!("{} content: {}", self, e)))?;

        let map = parsed
            .try_deserialize::<Map<String, Value>>()
            .map_err(|e| ConfigError::ParseFailure(format!("{} content: {}", self, e)))?;

        Ok(Value::new(None, ValueKind::Table(map)))
    }

    /// Serialize a value into this format.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SerializationError`] if the value cannot be
    /// represented (for example a bare scalar in TOML).
    pub fn serialize<T: Serialize>(&self, value: &T) -> Result<String> {
        match self {
            Self::Yaml => serde_yaml::to_string(value)
                .map_err(|e| ConfigError::SerializationError(e.to_string())),
            Self::Json => serde_json::to_string_pretty(value)
                .map_err(|e| ConfigError::SerializationError(e.to_string())),
            Self::Toml => toml::to_string_pretty(value)
                .map_err(|e| ConfigError::SerializationError(e.to_string())),
        }
    }
}

impl FromStr for FileFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_type(s)
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
