//! Change notification: the two watchers, the dispatcher and their shutdown signal.

mod dispatcher;
mod local_watcher;
pub(crate) mod remote_watcher;
mod shutdown;

pub use dispatcher::{ChangeCallback, ChangeDispatcher};
pub use local_watcher::LocalWatcher;
pub use shutdown::{ShutdownSignal, ShutdownTrigger, channel as shutdown_channel};
