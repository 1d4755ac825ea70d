//! Typed configuration request describing where configuration comes from.

use crate::error::{ConfigError, Result};
use crate::sources::FileFormat;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default interval between remote watch attempts.
pub const DEFAULT_REMOTE_INTERVAL: Duration = Duration::from_secs(5);

/// Default coalescing window for local file events.
pub const DEFAULT_WATCH_DEBOUNCE: Duration = Duration::from_millis(250);

/// Which store is authoritative for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SourcePolicy {
    /// Only the local file is authoritative.
    Local,
    /// Only the remote store is authoritative.
    Remote,
    /// Try the local file first and fall back to the remote store.
    #[default]
    Auto,
}

impl FromStr for SourcePolicy {
    type Err = ConfigError;

    /// Parses `local`, `remote` and `auto`. The empty string also selects
    /// [`SourcePolicy::Auto`].
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            "auto" | "" => Ok(Self::Auto),
            other => Err(ConfigError::InvalidRequest(format!(
                "Unknown source policy: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for SourcePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote => f.write_str("remote"),
            Self::Auto => f.write_str("auto"),
        }
    }
}

/// Location of the local configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSpec {
    path: PathBuf,
    format: FileFormat,
}

impl LocalSpec {
    /// Full path of the configuration file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory that holds the configuration file.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Format of the configuration file.
    pub fn format(&self) -> FileFormat {
        self.format
    }
}

/// Location of the remote configuration key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSpec {
    provider: String,
    url: String,
    key_path: String,
    format: FileFormat,
}

impl RemoteSpec {
    /// Provider name (`http`, `https`, `etcd`, or a custom name).
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Connection URL of the provider.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Key path of the watched configuration document.
    pub fn key_path(&self) -> &str {
        &self.key_path
    }

    /// Encoding of the remote document.
    pub fn format(&self) -> FileFormat {
        self.format
    }
}

/// Immutable description of where to load configuration from.
///
/// Built once at startup through [`ConfigurationRequest::builder`], which
/// validates the combination of sources and policy.
///
/// # Examples
///
/// ```rust
/// use cloud_reload::core::{ConfigurationRequest, SourcePolicy};
///
/// let request = ConfigurationRequest::builder()
///     .with_local("/etc/app", "cfg", "yaml")
///     .with_remote("etcd", "http://localhost:4001", "/config/app", "json")
///     .with_policy(SourcePolicy::Auto)
///     .with_dynamic_reload(true)
///     .build()
///     .unwrap();
///
/// assert!(request.local().is_some());
/// ```
#[derive(Debug, Clone)]
pub struct ConfigurationRequest {
    local: Option<LocalSpec>,
    remote: Option<RemoteSpec>,
    policy: SourcePolicy,
    dynamic_reload: bool,
    remote_interval: Duration,
    watch_debounce: Duration,
}

impl ConfigurationRequest {
    /// Create a new request builder.
    pub fn builder() -> ConfigurationRequestBuilder {
        ConfigurationRequestBuilder::new()
    }

    /// Local file specification, if any.
    pub fn local(&self) -> Option<&LocalSpec> {
        self.local.as_ref()
    }

    /// Remote key specification, if any.
    pub fn remote(&self) -> Option<&RemoteSpec> {
        self.remote.as_ref()
    }

    /// Source policy for the session.
    pub fn policy(&self) -> SourcePolicy {
        self.policy
    }

    /// Whether watch-driven reload is enabled.
    pub fn dynamic_reload(&self) -> bool {
        self.dynamic_reload
    }

    /// Sleep between remote watch attempts.
    pub fn remote_interval(&self) -> Duration {
        self.remote_interval
    }

    /// Quiet period required after a local file event before reloading.
    pub fn watch_debounce(&self) -> Duration {
        self.watch_debounce
    }
}

enum LocalInput {
    Parts {
        dir: PathBuf,
        file_name: String,
        file_type: String,
    },
    File(PathBuf),
}

/// Builder for [`ConfigurationRequest`].
pub struct ConfigurationRequestBuilder {
    local: Option<LocalInput>,
    remote: Option<(String, String, String, String)>,
    policy: SourcePolicy,
    dynamic_reload: bool,
    remote_interval: Duration,
    watch_debounce: Duration,
}

impl ConfigurationRequestBuilder {
    /// Create a builder with the `Auto` policy and dynamic reload disabled.
    pub fn new() -> Self {
        Self {
            local: None,
            remote: None,
            policy: SourcePolicy::Auto,
            dynamic_reload: false,
            remote_interval: DEFAULT_REMOTE_INTERVAL,
            watch_debounce: DEFAULT_WATCH_DEBOUNCE,
        }
    }

    /// Local file given as directory, base file name and file type.
    ///
    /// `with_local("/etc/app", "cfg", "yaml")` resolves to `/etc/app/cfg.yaml`.
    pub fn with_local(
        mut self,
        dir: impl Into<PathBuf>,
        file_name: impl Into<String>,
        file_type: impl Into<String>,
    ) -> Self {
        self.local = Some(LocalInput::Parts {
            dir: dir.into(),
            file_name: file_name.into(),
            file_type: file_type.into(),
        });
        self
    }

    /// Local file given as a full path; the format comes from its extension.
    pub fn with_local_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.local = Some(LocalInput::File(path.into()));
        self
    }

    /// Remote key served by `provider` at `url`, encoded as `file_type`.
    pub fn with_remote(
        mut self,
        provider: impl Into<String>,
        url: impl Into<String>,
        key_path: impl Into<String>,
        file_type: impl Into<String>,
    ) -> Self {
        self.remote = Some((
            provider.into(),
            url.into(),
            key_path.into(),
            file_type.into(),
        ));
        self
    }

    /// Set the source policy.
    pub fn with_policy(mut self, policy: SourcePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enable or disable watch-driven reload.
    pub fn with_dynamic_reload(mut self, enabled: bool) -> Self {
        self.dynamic_reload = enabled;
        self
    }

    /// Interval between remote watch attempts. Default is 5 seconds.
    pub fn with_remote_interval(mut self, interval: Duration) -> Self {
        self.remote_interval = interval;
        self
    }

    /// Coalescing window for local file events. Zero reloads on every event.
    pub fn with_watch_debounce(mut self, debounce: Duration) -> Self {
        self.watch_debounce = debounce;
        self
    }

    /// Validate and build the request.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRequest`] if:
    /// - a file type is unsupported or a file name is empty
    /// - the policy names a source that was not specified
    /// - the remote interval is zero
    pub fn build(self) -> Result<ConfigurationRequest> {
        let local = self.local.map(resolve_local).transpose()?;

        let remote = self
            .remote
            .map(|(provider, url, key_path, file_type)| {
                if provider.trim().is_empty() {
                    return Err(ConfigError::InvalidRequest(
                        "Remote provider name is required".to_string(),
                    ));
                }
                if url.trim().is_empty() {
                    return Err(ConfigError::InvalidRequest(
                        "Remote URL is required".to_string(),
                    ));
                }
                Ok(RemoteSpec {
                    provider: provider.to_ascii_lowercase(),
                    url,
                    key_path,
                    format: FileFormat::from_type(&file_type)?,
                })
            })
            .transpose()?;

        match self.policy {
            SourcePolicy::Local if local.is_none() => {
                return Err(ConfigError::InvalidRequest(
                    "Local policy requires a local file".to_string(),
                ));
            }
            SourcePolicy::Remote if remote.is_none() => {
                return Err(ConfigError::InvalidRequest(
                    "Remote policy requires a remote provider".to_string(),
                ));
            }
            SourcePolicy::Auto if local.is_none() && remote.is_none() => {
                return Err(ConfigError::InvalidRequest(
                    "No configuration source specified".to_string(),
                ));
            }
            _ => {}
        }

        if self.remote_interval.is_zero() {
            return Err(ConfigError::InvalidRequest(
                "Remote watch interval must be greater than zero".to_string(),
            ));
        }

        Ok(ConfigurationRequest {
            local,
            remote,
            policy: self.policy,
            dynamic_reload: self.dynamic_reload,
            remote_interval: self.remote_interval,
            watch_debounce: self.watch_debounce,
        })
    }
}

impl Default for ConfigurationRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_local(input: LocalInput) -> Result<LocalSpec> {
    match input {
        LocalInput::Parts {
            dir,
            file_name,
            file_type,
        } => {
            if file_name.trim().is_empty() {
                return Err(ConfigError::InvalidRequest(
                    "Local file name is required".to_string(),
                ));
            }
            let format = FileFormat::from_type(&file_type)?;
            let extension = file_type.trim_start_matches('.');
            Ok(LocalSpec {
                path: dir.join(format!("{}.{}", file_name, extension)),
                format,
            })
        }
        LocalInput::File(path) => {
            let format = FileFormat::from_path(&path)?;
            Ok(LocalSpec { path, format })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_local_parts_resolve_to_path() {
        let request = ConfigurationRequest::builder()
            .with_local("/etc/app", "cfg", "yaml")
            .with_policy(SourcePolicy::Local)
            .build()
            .unwrap();

        let local = request.local().unwrap();
        assert_eq!(local.path(), Path::new("/etc/app/cfg.yaml"));
        assert_eq!(local.dir(), Path::new("/etc/app"));
        assert_eq!(local.format(), FileFormat::Yaml);
    }

    #[test]
    fn test_local_file_with_type() {
        let request = ConfigurationRequest::builder()
            .with_local_file("/etc/app/cfg.yml")
            .build()
            .unwrap();
        assert_eq!(request.local().unwrap().format(), FileFormat::Yaml);
    }

    #[test]
    fn test_remote_spec() {
        let request = ConfigurationRequest::builder()
            .with_remote("ETCD", "http://localhost:4001", "/config/app", "json")
            .with_policy(SourcePolicy::Remote)
            .build()
            .unwrap();

        let remote = request.remote().unwrap();
        assert_eq!(remote.provider(), "etcd");
        assert_eq!(remote.key_path(), "/config/app");
        assert_eq!(remote.format(), FileFormat::Json);
    }

    #[test]
    fn test_policy_requires_matching_source() {
        let err = ConfigurationRequest::builder()
            .with_remote("etcd", "http://localhost:4001", "/k", "json")
            .with_policy(SourcePolicy::Local)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRequest(_)));

        let err = ConfigurationRequest::builder()
            .with_local("/etc/app", "cfg", "yaml")
            .with_policy(SourcePolicy::Remote)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRequest(_)));

        assert!(ConfigurationRequest::builder().build().is_err());
    }

    #[test]
    fn test_rejects_bad_inputs() {
        assert!(
            ConfigurationRequest::builder()
                .with_local("/etc/app", "cfg", "ini")
                .build()
                .is_err()
        );
        assert!(
            ConfigurationRequest::builder()
                .with_local("/etc/app", "", "yaml")
                .build()
                .is_err()
        );
        assert!(
            ConfigurationRequest::builder()
                .with_local("/etc/app", "cfg", "yaml")
                .with_remote_interval(Duration::ZERO)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_defaults() {
        let request = ConfigurationRequest::builder()
            .with_local("/etc/app", "cfg", "json")
            .build()
            .unwrap();
        assert_eq!(request.policy(), SourcePolicy::Auto);
        assert!(!request.dynamic_reload());
        assert_eq!(request.remote_interval(), DEFAULT_REMOTE_INTERVAL);
        assert_eq!(request.watch_debounce(), DEFAULT_WATCH_DEBOUNCE);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("local".parse::<SourcePolicy>().unwrap(), SourcePolicy::Local);
        assert_eq!("Remote".parse::<SourcePolicy>().unwrap(), SourcePolicy::Remote);
        assert_eq!("".parse::<SourcePolicy>().unwrap(), SourcePolicy::Auto);
        assert!("cloud".parse::<SourcePolicy>().is_err());
    }

    proptest! {
        #[test]
        fn prop_policy_display_round_trips(policy in prop_oneof![
            Just(SourcePolicy::Local),
            Just(SourcePolicy::Remote),
            Just(SourcePolicy::Auto),
        ]) {
            prop_assert_eq!(policy.to_string().parse::<SourcePolicy>().unwrap(), policy);
        }
    }
}
