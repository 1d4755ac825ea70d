//! Builder for starting a configuration session.

use super::engine::Engine;
use super::request::{ConfigurationRequest, SourcePolicy};
use super::selector::{Stores, select_and_load};
use super::session::CloudConfig;
use crate::error::{ConfigError, Result};
use crate::sources::{LocalStore, RemoteProvider, RemoteStore};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

#[cfg(feature = "metrics")]
use crate::metrics::ReloadMetrics;

/// Builder for a [`CloudConfig`] session.
///
/// The request says where configuration lives; the builder adds runtime
/// collaborators that cannot be expressed as plain data.
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
///     .with_local("/etc/app", "cfg", "yaml")
///     .with_remote("etcd", "http://localhost:4001", "/config/app", "json")
///     .with_policy(SourcePolicy::Auto)
///     .build()?;
///
/// let config = CloudConfig::builder(request)
///     .init::<AppConfig>()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    request: ConfigurationRequest,
    remote_provider: Option<Arc<dyn RemoteProvider>>,
    #[cfg(feature = "metrics")]
    meter: Option<opentelemetry::metrics::Meter>,
}

impl SessionBuilder {
    /// Create a builder for `request`.
    pub fn new(request: ConfigurationRequest) -> Self {
        Self {
            request,
            remote_provider: None,
            #[cfg(feature = "metrics")]
            meter: None,
        }
    }

    /// Use `provider` for the remote key instead of a built-in provider.
    pub fn with_remote_provider<P: RemoteProvider + 'static>(self, provider: P) -> Self {
        self.with_shared_remote_provider(Arc::new(provider))
    }

    /// Use an already shared provider for the remote key.
    pub fn with_shared_remote_provider(mut self, provider: Arc<dyn RemoteProvider>) -> Self {
        self.remote_provider = Some(provider);
        self
    }

    /// Record reload metrics on `meter`.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, meter: opentelemetry::metrics::Meter) -> Self {
        self.meter = Some(meter);
        self
    }

    /// Select the authoritative source and load the initial configuration.
    ///
    /// Only the stores the policy can use are created: no remote store under
    /// `Local`, no local store under `Remote`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - a remote provider was supplied without a remote specification
    /// - the remote provider name is not built in and none was supplied
    /// - no source could be loaded under the policy
    pub async fn init<T>(self) -> Result<CloudConfig<T>>
    where
        T: DeserializeOwned + Serialize + Send + Sync + 'static,
    {
        let policy = self.request.policy();

        let local = match policy {
            SourcePolicy::Remote => None,
            SourcePolicy::Local | SourcePolicy::Auto => {
                self.request.local().cloned().map(LocalStore::new)
            }
        };

        let remote = match (policy, self.request.remote(), self.remote_provider) {
            (SourcePolicy::Local, _, _) => None,
            (_, Some(spec), Some(provider)) => Some(RemoteStore::new(spec.clone(), provider)),
            (_, Some(spec), None) => Some(RemoteStore::from_spec(spec.clone())?),
            (_, None, Some(_)) => {
                return Err(ConfigError::InvalidRequest(
                    "A remote provider was supplied without a remote specification".to_string(),
                ));
            }
            (_, None, None) => None,
        };

        let stores = Stores::new(local, remote);
        let (source, config) = select_and_load::<T>(&stores, policy).await?;
        tracing::info!(%policy, %source, "configuration session initialized");

        let engine = Engine::new(config, source, stores, policy);
        #[cfg(feature = "metrics")]
        let engine = match self.meter {
            Some(meter) => engine.with_metrics(ReloadMetrics::new(meter)),
            None => engine,
        };

        Ok(CloudConfig::from_engine(engine, self.request))
    }
}
