//! Remote watcher: poll the remote change signal on a fixed interval.

use super::ShutdownSignal;
use crate::core::{Engine, WatchStep};
use crate::sources::{ConfigStore, RemoteStore, SourceKind};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Start the remote watch loop on a background task.
///
/// Every `interval` the loop waits on the store's change signal:
/// - a watch error skips the cycle and retries after the next interval,
///   without limit;
/// - `false` (spurious wake, dropped connection) skips the cycle;
/// - `true` reloads from the remote store and dispatches the result.
///
/// The loop ends on shutdown or once the application rejects a change.
pub(crate) fn spawn<T>(
    engine: Arc<Engine<T>>,
    store: Arc<RemoteStore>,
    interval: Duration,
    mut shutdown: ShutdownSignal,
) -> JoinHandle<()>
where
    T: DeserializeOwned + Serialize + Send + Sync + 'static,
{
    tokio::spawn(async move {
        tracing::info!(store = %store.name(), ?interval, "remote watcher started");

        // Establish the provider's baseline so the first watch reports real changes only.
        tokio::select! {
            _ = shutdown.cancelled() => return,
            primed = store.read_raw() => {
                if let Err(e) = primed {
                    tracing::warn!(store = %store.name(), error = %e, "initial remote read failed");
                }
            }
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(interval) => {}
            }

            let changed = tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = store.watch() => changed,
            };

            match changed {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    tracing::warn!(store = %store.name(), error = %e, "remote watch failed, retrying");
                    continue;
                }
            }

            if engine.handle_change(SourceKind::Remote).await == WatchStep::Stop {
                break;
            }
        }

        tracing::info!(store = %store.name(), "remote watcher stopped");
    })
}
