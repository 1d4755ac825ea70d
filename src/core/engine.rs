//! Shared session state, change handling and rollback.

use super::pipeline::{self, ReloadOutcome};
use super::request::SourcePolicy;
use super::selector::Stores;
use crate::notify::ChangeDispatcher;
use crate::sources::{ConfigStore, FileFormat, SourceKind};
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

#[cfg(feature = "metrics")]
use crate::metrics::ReloadMetrics;

/// A published configuration together with the store it came from.
pub(crate) struct Snapshot<T> {
    pub(crate) config: Arc<T>,
    pub(crate) source: SourceKind,
    pub(crate) committed_at: DateTime<Utc>,
}

impl<T> Snapshot<T> {
    fn new(config: Arc<T>, source: SourceKind) -> Arc<Self> {
        Arc::new(Self {
            config,
            source,
            committed_at: Utc::now(),
        })
    }
}

/// What a watcher loop does after handling a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WatchStep {
    Continue,
    Stop,
}

/// State shared by the session handle and both watchers.
///
/// `current` is what readers see. `known_good` is the last snapshot the
/// application accepted. Outside of `handle_change` both point at the same
/// snapshot; every writer holds `writer` for its whole read-swap-dispatch
/// sequence.
pub(crate) struct Engine<T> {
    current: ArcSwap<Snapshot<T>>,
    known_good: ArcSwap<Snapshot<T>>,
    writer: Mutex<()>,
    stores: Stores,
    policy: SourcePolicy,
    dispatcher: ChangeDispatcher<T>,
    #[cfg(feature = "metrics")]
    metrics: Option<ReloadMetrics>,
}

impl<T> Engine<T> {
    pub(crate) fn snapshot(&self) -> Arc<Snapshot<T>> {
        self.current.load_full()
    }

    pub(crate) fn stores(&self) -> &Stores {
        &self.stores
    }

    pub(crate) fn policy(&self) -> SourcePolicy {
        self.policy
    }

    pub(crate) fn dispatcher(&self) -> &ChangeDispatcher<T> {
        &self.dispatcher
    }
}

impl<T> Engine<T>
where
    T: DeserializeOwned + Serialize + Send + Sync + 'static,
{
    pub(crate) fn new(initial: T, source: SourceKind, stores: Stores, policy: SourcePolicy) -> Self {
        let snapshot = Snapshot::new(Arc::new(initial), source);
        Self {
            current: ArcSwap::new(Arc::clone(&snapshot)),
            known_good: ArcSwap::new(snapshot),
            writer: Mutex::new(()),
            stores,
            policy,
            dispatcher: ChangeDispatcher::new(),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    #[cfg(feature = "metrics")]
    pub(crate) fn with_metrics(mut self, metrics: ReloadMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Format of the store the current configuration came from.
    pub(crate) fn active_format(&self) -> Option<FileFormat> {
        self.stores
            .get(self.snapshot().source)
            .map(|store| store.format())
    }

    /// Reload from the store of `kind`, dispatch, and commit or roll back.
    ///
    /// Returns [`WatchStep::Stop`] once the application rejects a change; the
    /// calling watcher must not deliver further changes.
    pub(crate) async fn handle_change(&self, kind: SourceKind) -> WatchStep {
        let _writer = self.writer.lock().await;

        let Some(store) = self.stores.get(kind) else {
            tracing::error!(source = %kind, "change reported for a store the session does not own");
            return WatchStep::Stop;
        };

        let started = self.record_reload_start(kind);
        match pipeline::reload::<T>(store).await {
            ReloadOutcome::Success(config) => {
                self.record_reload_end(kind, started, true);
                let config = Arc::new(config);
                self.current.store(Snapshot::new(Arc::clone(&config), kind));

                if self.dispatcher.dispatch(&config) {
                    self.known_good.store(self.current.load_full());
                    tracing::info!(source = %kind, "configuration change accepted");
                    WatchStep::Continue
                } else {
                    tracing::warn!(
                        source = %kind,
                        "configuration change rejected, rolling back and stopping watcher"
                    );
                    self.record_rejection(kind);
                    self.rollback().await;
                    WatchStep::Stop
                }
            }
            ReloadOutcome::Failure(err) => {
                self.record_reload_end(kind, started, false);
                match kind {
                    SourceKind::Local => {
                        tracing::warn!(source = %kind, error = %err, "reload failed, rolling back");
                        self.rollback().await;
                    }
                    SourceKind::Remote => {
                        tracing::warn!(source = %kind, error = %err, "reload failed, skipping cycle");
                    }
                }
                WatchStep::Continue
            }
        }
    }

    /// Restore the last known-good configuration.
    ///
    /// The configuration is written back to the local file and re-read from
    /// it. Under the `Remote` policy, without a local store, or when the
    /// write or re-read fails, the in-memory snapshot is republished instead.
    /// Callers must hold `writer`.
    async fn rollback(&self) {
        let last_good = self.known_good.load_full();
        self.record_rollback();

        let local = match self.policy {
            SourcePolicy::Remote => None,
            SourcePolicy::Local | SourcePolicy::Auto => self.stores.local(),
        };
        let Some(local) = local else {
            self.current.store(last_good);
            tracing::info!("restored last known-good configuration in memory");
            return;
        };

        let text = match local.format().serialize(&*last_good.config) {
            Ok(text) => text,
            Err(err) => {
                tracing::error!(error = %err, "rollback abandoned, cannot serialize last known-good configuration");
                self.current.store(last_good);
                return;
            }
        };

        if let Err(err) = local.write(text).await {
            tracing::error!(
                path = %local.path().display(),
                error = %err,
                "rollback abandoned, cannot write configuration file"
            );
            self.current.store(last_good);
            return;
        }

        match pipeline::reload::<T>(&**local).await {
            ReloadOutcome::Success(config) => {
                let snapshot = Snapshot::new(Arc::new(config), SourceKind::Local);
                self.current.store(Arc::clone(&snapshot));
                self.known_good.store(snapshot);
                tracing::info!(
                    path = %local.path().display(),
                    "rolled back to last known-good configuration"
                );
            }
            ReloadOutcome::Failure(err) => {
                tracing::error!(error = %err, "re-reading rolled back file failed");
                self.current.store(last_good);
            }
        }
    }

    fn record_reload_start(&self, _kind: SourceKind) -> Instant {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            return metrics.start_reload(_kind);
        }
        Instant::now()
    }

    fn record_reload_end(&self, _kind: SourceKind, _started: Instant, _success: bool) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            if _success {
                metrics.record_reload_success(_kind, _started);
            } else {
                metrics.record_reload_failure(_kind, _started);
            }
            metrics.update_config_age();
        }
    }

    fn record_rejection(&self, _kind: SourceKind) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_rejection(_kind);
        }
    }

    fn record_rollback(&self) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_rollback();
        }
    }
}
