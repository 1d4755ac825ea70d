//! Local file configuration store.

use super::{ConfigStore, FileFormat, SourceKind};
use crate::core::LocalSpec;
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use tokio::sync::Mutex;

/// Local file configuration store.
///
/// Reads and writes of the file are serialized through one lock, so a reload
/// never observes a rollback write half-way through.
///
/// # Examples
///
/// ```rust,no_run
/// use cloud_reload::core::ConfigurationRequest;
/// use cloud_reload::sources::LocalStore;
///
/// let request = ConfigurationRequest::builder()
///     .with_local("/etc/app", "cfg", "yaml")
///     .build()
///     .unwrap();
/// let store = LocalStore::new(request.local().unwrap().clone());
/// assert!(store.path().ends_with("cfg.yaml"));
/// ```
pub struct LocalStore {
    spec: LocalSpec,
    /// Guards file access. Holds the text of the last rollback write until
    /// the file content moves on.
    io: Mutex<Option<String>>,
}

impl LocalStore {
    /// Create a store for the given local file.
    pub fn new(spec: LocalSpec) -> Self {
        Self {
            spec,
            io: Mutex::new(None),
        }
    }

    /// Path of the configuration file.
    pub fn path(&self) -> &Path {
        self.spec.path()
    }

    /// Directory watched for file events.
    pub fn dir(&self) -> &Path {
        self.spec.dir()
    }

    /// Overwrite the configuration file with `text`.
    ///
    /// The written text is remembered so the watcher can tell its own
    /// rollback writes apart from edits made by someone else.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::IoError`] if the file cannot be written.
    pub async fn write(&self, text: String) -> Result<()> {
        let mut last_written = self.io.lock().await;
        tokio::fs::write(self.spec.path(), text.as_bytes()).await?;
        *last_written = Some(text);
        Ok(())
    }

    /// Whether the file still holds exactly what the last rollback wrote.
    ///
    /// Once the content differs the remembered text is dropped, so later
    /// edits are never mistaken for rollback writes.
    pub async fn holds_own_write(&self) -> bool {
        let mut last_written = self.io.lock().await;
        let Some(expected) = last_written.as_deref() else {
            return false;
        };

        match tokio::fs::read_to_string(self.spec.path()).await {
            Ok(current) if current == expected => true,
            _ => {
                *last_written = None;
                false
            }
        }
    }
}

#[async_trait]
impl ConfigStore for LocalStore {
    async fn read_raw(&self) -> Result<String> {
        let _guard = self.io.lock().await;
        tokio::fs::read_to_string(self.spec.path())
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => ConfigError::SourceUnavailable(format!(
                    "Configuration file not found: {}",
                    self.spec.path().display()
                )),
                _ => ConfigError::SourceUnavailable(format!(
                    "Failed to read {}: {}",
                    self.spec.path().display(),
                    e
                )),
            })
    }

    fn format(&self) -> FileFormat {
        self.spec.format()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Local
    }

    fn name(&self) -> String {
        format!("file:{}", self.spec.path().display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ConfigurationRequest;
    use std::fs;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> LocalStore {
        let request = ConfigurationRequest::builder()
            .with_local(dir.path(), "cfg", "yaml")
            .build()
            .unwrap();
        LocalStore::new(request.local().unwrap().clone())
    }

    #[tokio::test]
    async fn test_read_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("cfg.yaml"), "name: svc1\n").unwrap();

        let store = store_in(&temp_dir);
        assert_eq!(store.read_raw().await.unwrap(), "name: svc1\n");
        assert_eq!(store.kind(), SourceKind::Local);
        assert_eq!(store.format(), FileFormat::Yaml);
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);

        let err = store.read_raw().await.unwrap_err();
        assert!(matches!(err, ConfigError::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_own_write_tracking() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        assert!(!store.holds_own_write().await);

        store.write("name: svc1\n".to_string()).await.unwrap();
        assert!(store.holds_own_write().await);
        // Still ours until the content changes.
        assert!(store.holds_own_write().await);

        fs::write(store.path(), "name: svc2\n").unwrap();
        assert!(!store.holds_own_write().await);

        // Forgotten for good once it diverged.
        fs::write(store.path(), "name: svc1\n").unwrap();
        assert!(!store.holds_own_write().await);
    }

    #[test]
    fn test_name() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        assert!(store.name().starts_with("file:"));
        assert!(store.name().contains("cfg.yaml"));
    }
}
