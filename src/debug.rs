//! Read-only rendering of the current configuration for inspection.
//!
//! A host application can expose these renderings on an admin endpoint; the
//! crate itself does not serve them.

use crate::error::{ConfigError, Result};
use crate::sources::FileFormat;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Renders one configuration snapshot.
///
/// The snapshot is captured when the view is created; later reloads are not
/// reflected.
#[derive(Debug)]
pub struct DebugView<T> {
    config: Arc<T>,
    format: FileFormat,
}

impl<T: Serialize> DebugView<T> {
    /// Create a view over `config` rendered as `format`.
    pub fn new(config: Arc<T>, format: FileFormat) -> Self {
        Self { config, format }
    }

    /// The format [`render_current`](Self::render_current) produces.
    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// MIME type matching [`render_current`](Self::render_current).
    pub fn content_type(&self) -> &'static str {
        match self.format {
            FileFormat::Yaml => "application/yaml",
            FileFormat::Json => "application/json",
            FileFormat::Toml => "application/toml",
        }
    }

    /// The whole configuration in the active source's format.
    pub fn render_current(&self) -> Result<String> {
        self.format.serialize(&*self.config)
    }

    /// The value at a dotted `key`, matched case-insensitively.
    ///
    /// Scalars render as their JSON text, branches as pretty-printed JSON.
    /// Array elements are addressed by index (`servers.0.host`). An empty key
    /// renders the whole configuration like
    /// [`render_current`](Self::render_current).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::KeyNotFound`] if no value exists at `key`.
    pub fn render_key(&self, key: &str) -> Result<String> {
        let key = key.trim();
        if key.is_empty() {
            return self.render_current();
        }

        let root = serde_json::to_value(&*self.config)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;
        let value = lookup(&root, key).ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;

        match value {
            Value::Object(_) | Value::Array(_) => serde_json::to_string_pretty(value),
            _ => serde_json::to_string(value),
        }
        .map_err(|e| ConfigError::SerializationError(e.to_string()))
    }
}

fn lookup<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.').try_fold(root, |node, segment| match node {
        Value::Object(map) => map.get(segment).or_else(|| {
            map.iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(segment))
                .map(|(_, value)| value)
        }),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}
