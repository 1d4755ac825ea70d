//! Core session types: the request, source selection, reload and the handle.

mod builder;
mod engine;
mod pipeline;
mod request;
mod selector;
mod session;

pub use builder::SessionBuilder;
pub(crate) use engine::{Engine, WatchStep};
pub use pipeline::{ReloadOutcome, decode, reload};
pub use request::{
    ConfigurationRequest, ConfigurationRequestBuilder, DEFAULT_REMOTE_INTERVAL,
    DEFAULT_WATCH_DEBOUNCE, LocalSpec, RemoteSpec, SourcePolicy,
};
pub use selector::{Stores, select_and_load};
pub use session::CloudConfig;
