//! Local watcher: reload when the configuration file is written.

use super::ShutdownSignal;
use crate::core::{Engine, WatchStep};
use crate::error::{ConfigError, Result};
use crate::sources::{LocalStore, SourceKind};
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

/// Longest a continuous burst of writes can hold back a reload, counted in
/// debounce windows from the first write.
const MAX_BURST_WINDOWS: u32 = 4;

/// Watches the directory of the local configuration file.
///
/// Only write events on the configuration file itself count; renames,
/// deletes, creations and metadata changes are ignored. Events arriving
/// within the debounce window of each other are coalesced into one reload,
/// since editors often emit several writes per save. A writer that never
/// pauses still gets a reload every few windows.
pub struct LocalWatcher {
    _watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<()>,
    debounce: Duration,
    store: Arc<LocalStore>,
}

impl LocalWatcher {
    /// Subscribe to file events for `store`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WatchError`] if the directory cannot be watched.
    pub fn new(store: Arc<LocalStore>, debounce: Duration) -> Result<Self> {
        let (event_tx, events) = mpsc::unbounded_channel();
        let file_name = store
            .path()
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| {
                ConfigError::WatchError(format!(
                    "Not a file path: {}",
                    store.path().display()
                ))
            })?;

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if is_write_to(&event, &file_name) {
                    let _ = event_tx.send(());
                } else {
                    tracing::trace!(kind = ?event.kind, "ignoring file event");
                }
            }
            Err(e) => tracing::warn!(error = %e, "file watch error"),
        })
        .map_err(|e| ConfigError::WatchError(format!("Failed to create file watcher: {}", e)))?;

        watcher
            .watch(store.dir(), RecursiveMode::NonRecursive)
            .map_err(|e| {
                ConfigError::WatchError(format!(
                    "Failed to watch {}: {}",
                    store.dir().display(),
                    e
                ))
            })?;

        Ok(Self {
            _watcher: watcher,
            events,
            debounce,
            store,
        })
    }

    /// Wait for the next (coalesced) write to the configuration file.
    ///
    /// Returns `false` once shutdown is signalled or the event source is gone.
    pub async fn next_change(&mut self, shutdown: &mut ShutdownSignal) -> bool {
        coalesce(&mut self.events, self.debounce, shutdown).await
    }

    /// Run the watch loop on a background task until shutdown or rejection.
    pub(crate) fn spawn<T>(
        mut self,
        engine: Arc<Engine<T>>,
        mut shutdown: ShutdownSignal,
    ) -> JoinHandle<()>
    where
        T: DeserializeOwned + Serialize + Send + Sync + 'static,
    {
        tokio::spawn(async move {
            tracing::info!(path = %self.store.path().display(), "local watcher started");

            while self.next_change(&mut shutdown).await {
                if self.store.holds_own_write().await {
                    tracing::debug!("skipping event caused by rollback write");
                    continue;
                }
                if engine.handle_change(SourceKind::Local).await == WatchStep::Stop {
                    break;
                }
            }

            tracing::info!(path = %self.store.path().display(), "local watcher stopped");
        })
    }
}

/// Wait for one event, then for a quiet `debounce` window or the burst cap.
async fn coalesce(
    events: &mut mpsc::UnboundedReceiver<()>,
    debounce: Duration,
    shutdown: &mut ShutdownSignal,
) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => return false,
        event = events.recv() => {
            if event.is_none() {
                return false;
            }
        }
    }

    if debounce.is_zero() {
        return true;
    }

    let deadline = Instant::now() + debounce * MAX_BURST_WINDOWS;
    loop {
        let quiet_until = (Instant::now() + debounce).min(deadline);
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return false,
            _ = sleep_until(quiet_until) => return true,
            event = events.recv() => {
                if event.is_none() {
                    return true;
                }
            }
        }
    }
}

/// Whether `event` is a content write to the file called `file_name`.
fn is_write_to(event: &Event, file_name: &OsString) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any)
    ) && event
        .paths
        .iter()
        .any(|path| path.file_name() == Some(file_name.as_os_str()))
}
