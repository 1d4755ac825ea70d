//! Built-in metrics for reload operations.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Reload attempts/success/failures per source
//! - Reload duration
//! - Callback rejections and rollbacks
//! - Configuration age
//!
//! # Examples
//!
//! ```rust,no_run
//! use cloud_reload::prelude::*;
//! use opentelemetry::global;
//!
//! # async fn example() -> Result<()> {
//! let request = ConfigurationRequest::builder()
//!     .with_local("/etc/app", "cfg", "yaml")
//!     .build()?;
//!
//! let config = CloudConfig::builder(request)
//!     .with_metrics(global::meter("my-app"))
//!     .init::<AppConfig>()
//!     .await?;
//! # Ok(())
//! # }
//! # #[derive(serde::Deserialize, serde::Serialize)] struct AppConfig {}
//! ```

mod reload_metrics;

pub use reload_metrics::ReloadMetrics;
