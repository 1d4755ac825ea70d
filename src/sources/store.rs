//! Store trait shared by the local and remote configuration stores.

use super::FileFormat;
use crate::error::Result;
use async_trait::async_trait;
use std::fmt;

/// Which kind of store a configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// The local configuration file.
    Local,
    /// The remote key-value store.
    Remote,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

/// A readable configuration store.
///
/// Each call to [`read_raw`](ConfigStore::read_raw) goes back to the
/// underlying medium: the file is re-opened, the remote key is re-fetched.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Re-read the raw configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SourceUnavailable`](crate::error::ConfigError::SourceUnavailable)
    /// when the medium cannot be reached.
    async fn read_raw(&self) -> Result<String>;

    /// Format of the document returned by `read_raw`.
    fn format(&self) -> FileFormat;

    /// Which kind of store this is.
    fn kind(&self) -> SourceKind;

    /// Human-readable name for logging.
    fn name(&self) -> String;
}
