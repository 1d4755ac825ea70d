//! # cloud-reload
//!
//! Load an application's configuration from a local file or a remote
//! key/value store, and reload it at runtime without restarting.
//!
//! ## Overview
//!
//! A session is created from a [`ConfigurationRequest`](core::ConfigurationRequest)
//! naming a local file, a remote key, or both, plus a policy deciding which
//! of them is authoritative. The initial configuration is loaded once. With
//! dynamic reload enabled, registering a change callback starts watchers:
//!
//! - the local file is watched for writes
//! - the remote key is polled on an interval
//!
//! Each change is reloaded and handed to the callback. Returning `false`
//! rejects it: the last accepted configuration is restored and the watcher
//! that delivered the change stops.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cloud_reload::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Deserialize, Serialize)]
//! struct AppConfig {
//!     name: String,
//!     level: String,
//! }
//!
//! # async fn example() -> cloud_reload::error::Result<()> {
//! let request = ConfigurationRequest::builder()
//!     .with_local("/etc/app", "cfg", "yaml")
//!     .with_remote("etcd", "http://localhost:4001", "/config/app", "yaml")
//!     .with_policy(SourcePolicy::Auto)
//!     .with_dynamic_reload(true)
//!     .build()?;
//!
//! let config: CloudConfig<AppConfig> = CloudConfig::init(request).await?;
//! println!("running as {}", config.get_current_config().name);
//!
//! config
//!     .register_change_callback(|cfg: &AppConfig| cfg.level != "trace")
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `remote` (default): built-in `http`, `https` and `etcd` providers
//! - `metrics`: OpenTelemetry reload metrics

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod debug;
pub mod error;
pub mod notify;
pub mod sources;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{CloudConfig, ConfigurationRequest, SessionBuilder, SourcePolicy};
    pub use crate::debug::DebugView;
    pub use crate::error::{ConfigError, Result};
    pub use crate::sources::{FileFormat, RemoteProvider, SourceKind};
}
