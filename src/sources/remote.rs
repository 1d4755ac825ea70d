//! Remote key-value configuration store.

use super::{ConfigStore, FileFormat, SourceKind};
use crate::core::RemoteSpec;
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Protocol adapter for a remote key-value store.
///
/// Implement this trait to plug in a provider that is not built in (the
/// built-in ones live in [`providers`](super::providers)).
#[async_trait]
pub trait RemoteProvider: Send + Sync {
    /// Fetch the current document stored under `key_path`.
    ///
    /// # Errors
    ///
    /// Should return [`ConfigError::SourceUnavailable`] when the provider
    /// cannot be reached or the key does not exist.
    async fn fetch(&self, key_path: &str) -> Result<Vec<u8>>;

    /// Wait for a change of `key_path`.
    ///
    /// Resolves `true` when a change was observed and `false` on a spurious
    /// wake or a dropped connection.
    ///
    /// # Errors
    ///
    /// Returns an error when the watch could not be established at all.
    async fn watch(&self, key_path: &str) -> Result<bool>;

    /// Human-readable provider name for logging.
    fn name(&self) -> String;
}

/// Remote configuration store bound to one key.
///
/// Its change channel serves a single watcher: a second concurrent
/// [`watch`](RemoteStore::watch) call fails instead of sharing the channel.
pub struct RemoteStore {
    spec: RemoteSpec,
    provider: Arc<dyn RemoteProvider>,
    watch_gate: Mutex<()>,
}

impl RemoteStore {
    /// Create a store that talks to `provider`.
    pub fn new(spec: RemoteSpec, provider: Arc<dyn RemoteProvider>) -> Self {
        Self {
            spec,
            provider,
            watch_gate: Mutex::new(()),
        }
    }

    /// Create a store using the built-in provider named by the spec.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRequest`] if the provider name is not
    /// built in, or the `remote` feature is disabled.
    pub fn from_spec(spec: RemoteSpec) -> Result<Self> {
        let provider = builtin_provider(&spec)?;
        Ok(Self::new(spec, provider))
    }

    /// The remote specification this store serves.
    pub fn spec(&self) -> &RemoteSpec {
        &self.spec
    }

    /// Wait for the next change of the watched key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WatchError`] if another watch is in progress,
    /// or whatever the provider reports when the watch cannot be established.
    pub async fn watch(&self) -> Result<bool> {
        let _gate = self.watch_gate.try_lock().map_err(|_| {
            ConfigError::WatchError(format!("{} is already being watched", self.name()))
        })?;
        self.provider.watch(self.spec.key_path()).await
    }
}

#[cfg(feature = "remote")]
fn builtin_provider(spec: &RemoteSpec) -> Result<Arc<dyn RemoteProvider>> {
    use super::providers::{EtcdProvider, HttpProvider};

    match spec.provider() {
        "http" | "https" => Ok(Arc::new(HttpProvider::builder().with_url(spec.url()).build()?)),
        "etcd" => Ok(Arc::new(EtcdProvider::new(spec.url())?)),
        other => Err(ConfigError::InvalidRequest(format!(
            "Unknown remote provider: {}. Built in: http, https, etcd",
            other
        ))),
    }
}

#[cfg(not(feature = "remote"))]
fn builtin_provider(spec: &RemoteSpec) -> Result<Arc<dyn RemoteProvider>> {
    Err(ConfigError::InvalidRequest(format!(
        "Remote provider '{}' requires the 'remote' feature or a custom provider",
        spec.provider()
    )))
}

#[async_trait]
impl ConfigStore for RemoteStore {
    async fn read_raw(&self) -> Result<String> {
        let bytes = self.provider.fetch(self.spec.key_path()).await?;
        String::from_utf8(bytes).map_err(|e| {
            ConfigError::ParseFailure(format!("{} returned non UTF-8 content: {}", self.name(), e))
        })
    }

    fn format(&self) -> FileFormat {
        self.spec.format()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Remote
    }

    fn name(&self) -> String {
        format!(
            "{}:{}{}",
            self.provider.name(),
            self.spec.url(),
            self.spec.key_path()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ConfigurationRequest, SourcePolicy};
    use std::time::Duration;

    struct SlowProvider;

    #[async_trait]
    impl RemoteProvider for SlowProvider {
        async fn fetch(&self, _key_path: &str) -> Result<Vec<u8>> {
            Ok(vec![0xff, 0xfe])
        }

        async fn watch(&self, _key_path: &str) -> Result<bool> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(true)
        }

        fn name(&self) -> String {
            "slow".to_string()
        }
    }

    fn spec(provider: &str) -> RemoteSpec {
        ConfigurationRequest::builder()
            .with_remote(provider, "http://localhost:4001", "/config/app", "json")
            .with_policy(SourcePolicy::Remote)
            .build()
            .unwrap()
            .remote()
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn test_second_watch_is_refused() {
        let store = Arc::new(RemoteStore::new(spec("slow"), Arc::new(SlowProvider)));

        let first = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.watch().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = store.watch().await;
        assert!(matches!(second, Err(ConfigError::WatchError(_))));
        assert!(first.await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn test_non_utf8_is_parse_failure() {
        let store = RemoteStore::new(spec("slow"), Arc::new(SlowProvider));
        let err = store.read_raw().await.unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailure(_)));
        assert_eq!(store.kind(), SourceKind::Remote);
        assert_eq!(store.name(), "slow:http://localhost:4001/config/app");
    }

    #[test]
    fn test_unknown_builtin_provider() {
        let err = RemoteStore::from_spec(spec("zookeeper")).err().unwrap();
        assert!(matches!(err, ConfigError::InvalidRequest(_)));
    }

    #[cfg(feature = "remote")]
    #[test]
    fn test_builtin_providers() {
        assert!(RemoteStore::from_spec(spec("etcd")).is_ok());
        assert!(RemoteStore::from_spec(spec("http")).is_ok());
    }
}
