//! The session handle applications hold.

use super::builder::SessionBuilder;
use super::engine::Engine;
use super::request::{ConfigurationRequest, SourcePolicy};
use crate::debug::DebugView;
use crate::error::{ConfigError, Result};
use crate::notify::{LocalWatcher, ShutdownTrigger, remote_watcher, shutdown_channel};
use crate::sources::{FileFormat, SourceKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;

/// A live configuration session.
///
/// Reads never block: [`get_current_config`](Self::get_current_config) loads
/// the current snapshot atomically, even while a watcher is swapping in a
/// new one. Cloning the handle is cheap and every clone sees the same
/// session.
///
/// Watchers run until [`shutdown`](Self::shutdown) is called, until the
/// application rejects a change, or until the last handle is dropped.
///
/// # Examples
///
/// ```rust,no_run
/// use cloud_reload::prelude::*;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Deserialize, Serialize)]
/// struct AppConfig {
///     name: String,
///     level: String,
/// }
///
/// # async fn example() -> Result<()> {
/// let request = ConfigurationRequest::builder()
///     .with_local_file("/cfg.yaml")
///     .with_dynamic_reload(true)
///     .build()?;
///
/// let config: CloudConfig<AppConfig> = CloudConfig::init(request).await?;
/// println!("level: {}", config.get_current_config().level);
///
/// config
///     .register_change_callback(|cfg: &AppConfig| {
///         println!("level is now {}", cfg.level);
///         true
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct CloudConfig<T> {
    inner: Arc<SessionInner<T>>,
}

struct SessionInner<T> {
    engine: Arc<Engine<T>>,
    request: ConfigurationRequest,
    shutdown: ShutdownTrigger,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<T> SessionInner<T> {
    fn tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Clone for CloudConfig<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for CloudConfig<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.inner.engine.snapshot();
        f.debug_struct("CloudConfig")
            .field("policy", &self.inner.engine.policy())
            .field("source", &snapshot.source)
            .field("committed_at", &snapshot.committed_at)
            .finish_non_exhaustive()
    }
}

impl CloudConfig<()> {
    /// Start building a session for `request`.
    pub fn builder(request: ConfigurationRequest) -> SessionBuilder {
        SessionBuilder::new(request)
    }
}

impl<T> CloudConfig<T>
where
    T: DeserializeOwned + Serialize + Send + Sync + 'static,
{
    pub(crate) fn from_engine(engine: Engine<T>, request: ConfigurationRequest) -> Self {
        let (shutdown, _) = shutdown_channel();
        Self {
            inner: Arc::new(SessionInner {
                engine: Arc::new(engine),
                request,
                shutdown,
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Load the initial configuration for `request` with built-in providers.
    ///
    /// # Errors
    ///
    /// Returns an error if no source can be loaded under the request's policy.
    pub async fn init(request: ConfigurationRequest) -> Result<Self> {
        SessionBuilder::new(request).init().await
    }

    /// The current configuration.
    ///
    /// The returned `Arc` stays valid after later reloads; call again to
    /// observe them.
    pub fn get_current_config(&self) -> Arc<T> {
        Arc::clone(&self.inner.engine.snapshot().config)
    }

    /// Which store the current configuration came from.
    pub fn active_source(&self) -> SourceKind {
        self.inner.engine.snapshot().source
    }

    /// When the current configuration was published.
    pub fn last_committed_at(&self) -> DateTime<Utc> {
        self.inner.engine.snapshot().committed_at
    }

    /// The request this session was created from.
    pub fn request(&self) -> &ConfigurationRequest {
        &self.inner.request
    }

    /// Whether any watcher is still running.
    ///
    /// Always `false` once [`shutdown`](Self::shutdown) has been called, even
    /// while watchers are still winding down.
    pub fn is_watching(&self) -> bool {
        if self.inner.shutdown.is_triggered() {
            return false;
        }
        self.inner.tasks().iter().any(|task| !task.is_finished())
    }

    /// Register the change callback and start watching.
    ///
    /// The callback runs once per successfully reloaded configuration. It
    /// returns `true` to accept the change. Returning `false` restores the
    /// last accepted configuration and stops the watcher that delivered the
    /// change.
    ///
    /// Watchers started per policy:
    /// - `Local`: the local file watcher
    /// - `Remote`: the remote polling watcher
    /// - `Auto`: both, for each store the session owns
    ///
    /// # Errors
    ///
    /// - [`ConfigError::DynamicReloadDisabled`] if the request did not enable it
    /// - [`ConfigError::CallbackAlreadyRegistered`] on a second registration
    /// - [`ConfigError::WatchError`] if the file watcher cannot be created or
    ///   the session was shut down
    pub async fn register_change_callback<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        if !self.inner.request.dynamic_reload() {
            return Err(ConfigError::DynamicReloadDisabled);
        }
        if self.inner.shutdown.is_triggered() {
            return Err(ConfigError::WatchError(
                "session has been shut down".to_string(),
            ));
        }

        let engine = &self.inner.engine;
        if engine.dispatcher().is_registered() {
            return Err(ConfigError::CallbackAlreadyRegistered);
        }

        let policy = engine.policy();
        let local_watcher = match (policy, engine.stores().local()) {
            (SourcePolicy::Local | SourcePolicy::Auto, Some(store)) => Some(LocalWatcher::new(
                Arc::clone(store),
                self.inner.request.watch_debounce(),
            )?),
            _ => None,
        };
        let remote_store = match (policy, engine.stores().remote()) {
            (SourcePolicy::Remote | SourcePolicy::Auto, Some(store)) => Some(Arc::clone(store)),
            _ => None,
        };

        engine.dispatcher().register(callback)?;

        let mut tasks = self.inner.tasks();
        if let Some(watcher) = local_watcher {
            tasks.push(watcher.spawn(Arc::clone(engine), self.inner.shutdown.subscribe()));
        }
        if let Some(store) = remote_store {
            tasks.push(remote_watcher::spawn(
                Arc::clone(engine),
                store,
                self.inner.request.remote_interval(),
                self.inner.shutdown.subscribe(),
            ));
        }

        tracing::info!(%policy, watchers = tasks.len(), "change callback registered");
        Ok(())
    }

    /// Stop all watchers and wait for them to finish. Idempotent.
    ///
    /// Reads keep working after shutdown and return the last published
    /// configuration.
    pub async fn shutdown(&self) {
        self.inner.shutdown.trigger();

        let tasks: Vec<_> = self.inner.tasks().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "watcher task ended abnormally");
            }
        }
        tracing::info!("configuration session shut down");
    }

    /// A read-only view for rendering the current configuration.
    pub fn debug_view(&self) -> DebugView<T> {
        let format = self
            .inner
            .engine
            .active_format()
            .unwrap_or(FileFormat::Json);
        DebugView::new(self.get_current_config(), format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Debug, Deserialize, Serialize)]
    struct TestConfig {
        name: String,
    }

    async fn session(dir: &TempDir, dynamic: bool) -> CloudConfig<TestConfig> {
        let path = dir.path().join("cfg.yaml");
        fs::write(&path, "name: svc1\n").unwrap();
        let request = ConfigurationRequest::builder()
            .with_local_file(&path)
            .with_dynamic_reload(dynamic)
            .build()
            .unwrap();
        CloudConfig::init(request).await.unwrap()
    }

    #[tokio::test]
    async fn test_initial_read() {
        let temp_dir = TempDir::new().unwrap();
        let config = session(&temp_dir, false).await;

        assert_eq!(config.get_current_config().name, "svc1");
        assert_eq!(config.active_source(), SourceKind::Local);
        assert!(!config.is_watching());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let temp_dir = TempDir::new().unwrap();
        let config = session(&temp_dir, true).await;
        let clone = config.clone();

        config.register_change_callback(|_| true).await.unwrap();
        let again = clone.register_change_callback(|_| true).await;
        assert!(matches!(again, Err(ConfigError::CallbackAlreadyRegistered)));

        config.shutdown().await;
    }

    #[tokio::test]
    async fn test_register_after_shutdown_fails() {
        let temp_dir = TempDir::new().unwrap();
        let config = session(&temp_dir, true).await;

        config.shutdown().await;
        let result = config.register_change_callback(|_| true).await;
        assert!(matches!(result, Err(ConfigError::WatchError(_))));
    }

    #[tokio::test]
    async fn test_debug_view_uses_active_format() {
        let temp_dir = TempDir::new().unwrap();
        let config = session(&temp_dir, false).await;

        let view = config.debug_view();
        assert_eq!(view.format(), FileFormat::Yaml);
        assert!(view.render_current().unwrap().contains("svc1"));
    }

    #[tokio::test]
    async fn test_not_watching_once_shutdown_begins() {
        let temp_dir = TempDir::new().unwrap();
        let config = session(&temp_dir, true).await;
        config.register_change_callback(|_| true).await.unwrap();
        assert!(config.is_watching());

        // Watchers are still alive here; only the trigger has fired.
        config.inner.shutdown.trigger();
        assert!(!config.is_watching());
        assert!(!config.inner.tasks().is_empty());

        config.shutdown().await;
        assert!(!config.is_watching());
    }
}
