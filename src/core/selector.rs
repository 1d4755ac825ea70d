//! Source selection: decide which store is authoritative and load from it.

use super::pipeline;
use super::request::SourcePolicy;
use crate::error::{ConfigError, Result};
use crate::sources::{ConfigStore, LocalStore, RemoteStore, SourceKind};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// The stores owned by one session.
#[derive(Clone, Default)]
pub struct Stores {
    local: Option<Arc<LocalStore>>,
    remote: Option<Arc<RemoteStore>>,
}

impl Stores {
    /// Bundle the session's stores. Either may be absent.
    pub fn new(local: Option<LocalStore>, remote: Option<RemoteStore>) -> Self {
        Self {
            local: local.map(Arc::new),
            remote: remote.map(Arc::new),
        }
    }

    /// The local file store, if configured.
    pub fn local(&self) -> Option<&Arc<LocalStore>> {
        self.local.as_ref()
    }

    /// The remote store, if configured.
    pub fn remote(&self) -> Option<&Arc<RemoteStore>> {
        self.remote.as_ref()
    }

    /// The store of the given kind as a trait object.
    pub fn get(&self, kind: SourceKind) -> Option<&dyn ConfigStore> {
        match kind {
            SourceKind::Local => self.local.as_deref().map(|s| s as &dyn ConfigStore),
            SourceKind::Remote => self.remote.as_deref().map(|s| s as &dyn ConfigStore),
        }
    }
}

/// Pick the authoritative store under `policy` and load `T` from it.
///
/// - `Local`: only the local file is tried.
/// - `Remote`: only the remote key is tried.
/// - `Auto`: the local file first, then the remote key.
///
/// The choice is made once per call; nothing is re-evaluated later on.
///
/// # Errors
///
/// With `Local` or `Remote`, returns the failure of that store. With `Auto`,
/// returns [`ConfigError::SourceUnavailable`] when neither store loads.
pub async fn select_and_load<T>(stores: &Stores, policy: SourcePolicy) -> Result<(SourceKind, T)>
where
    T: DeserializeOwned,
{
    match policy {
        SourcePolicy::Local => load_from(stores, SourceKind::Local).await,
        SourcePolicy::Remote => load_from(stores, SourceKind::Remote).await,
        SourcePolicy::Auto => {
            let local_err = match load_from(stores, SourceKind::Local).await {
                Ok(selected) => return Ok(selected),
                Err(e) => e,
            };
            tracing::warn!(error = %local_err, "local configuration unavailable, trying remote");

            match load_from(stores, SourceKind::Remote).await {
                Ok(selected) => Ok(selected),
                Err(remote_err) => Err(ConfigError::SourceUnavailable(format!(
                    "no source available (local: {}; remote: {})",
                    local_err, remote_err
                ))),
            }
        }
    }
}

async fn load_from<T>(stores: &Stores, kind: SourceKind) -> Result<(SourceKind, T)>
where
    T: DeserializeOwned,
{
    let store = stores.get(kind).ok_or_else(|| {
        ConfigError::SourceUnavailable(format!("no {} store configured", kind))
    })?;
    let value = pipeline::reload(store).await.into_result()?;
    tracing::info!(source = %kind, store = %store.name(), "configuration source selected");
    Ok((kind, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ConfigurationRequest;
    use serde::Deserialize;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Debug, Deserialize)]
    struct TestConfig {
        name: String,
    }

    fn local_store(dir: &TempDir) -> LocalStore {
        let request = ConfigurationRequest::builder()
            .with_local(dir.path(), "cfg", "yaml")
            .build()
            .unwrap();
        LocalStore::new(request.local().unwrap().clone())
    }

    #[tokio::test]
    async fn test_local_policy() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("cfg.yaml"), "name: svc1\n").unwrap();
        let stores = Stores::new(Some(local_store(&temp_dir)), None);

        let (kind, config): (_, TestConfig) =
            select_and_load(&stores, SourcePolicy::Local).await.unwrap();
        assert_eq!(kind, SourceKind::Local);
        assert_eq!(config.name, "svc1");
    }

    #[tokio::test]
    async fn test_local_policy_does_not_fall_back() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("cfg.yaml"), "name: [").unwrap();
        let stores = Stores::new(Some(local_store(&temp_dir)), None);

        let err = select_and_load::<TestConfig>(&stores, SourcePolicy::Local)
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailure(_)));
    }

    #[tokio::test]
    async fn test_auto_with_nothing_readable() {
        let temp_dir = TempDir::new().unwrap();
        let stores = Stores::new(Some(local_store(&temp_dir)), None);

        let err = select_and_load::<TestConfig>(&stores, SourcePolicy::Auto)
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_remote_policy_without_remote_store() {
        let stores = Stores::default();
        let err = select_and_load::<TestConfig>(&stores, SourcePolicy::Remote)
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::SourceUnavailable(_)));
    }
}
