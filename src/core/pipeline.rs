//! Reload pipeline: re-read a store and map its content onto the target type.

use crate::error::{ConfigError, Result};
use crate::sources::{ConfigStore, FileFormat, deserialize_tree};
use serde::de::DeserializeOwned;

/// Result of one read-parse-deserialize cycle.
///
/// A `Success` carries a freshly built value; nothing shared has been touched
/// yet. Publishing it is up to the caller, so a failed reload can never leave
/// a half-written configuration behind.
#[derive(Debug)]
pub enum ReloadOutcome<T> {
    /// The store was read and mapped onto `T`.
    Success(T),
    /// The store could not be read, parsed or mapped.
    Failure(ConfigError),
}

impl<T> ReloadOutcome<T> {
    /// Whether the reload succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Convert into a `Result`.
    ///
    /// # Errors
    ///
    /// Returns the failure reason of a `Failure` outcome.
    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(err) => Err(err),
        }
    }
}

impl<T> From<Result<T>> for ReloadOutcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(err) => Self::Failure(err),
        }
    }
}

/// Re-read `store` and deserialize its content into a new `T`.
///
/// Keys are matched to field names (after any serde renames) without regard
/// to case, and nested tables map onto nested structures.
pub async fn reload<T>(store: &dyn ConfigStore) -> ReloadOutcome<T>
where
    T: DeserializeOwned,
{
    let outcome = match store.read_raw().await {
        Ok(text) => decode::<T>(&text, store.format()).into(),
        Err(err) => ReloadOutcome::Failure(err),
    };

    if let ReloadOutcome::Failure(err) = &outcome {
        tracing::debug!(source = %store.name(), error = %err, "reload failed");
    }
    outcome
}

/// Parse `text` as `format` and map it onto `T`.
///
/// # Errors
///
/// - [`ConfigError::ParseFailure`] for malformed content
/// - [`ConfigError::MappingFailure`] when the content does not fit `T`
pub fn decode<T>(text: &str, format: FileFormat) -> Result<T>
where
    T: DeserializeOwned,
{
    let tree = format.parse_tree(text)?;
    deserialize_tree::<T>(tree).map_err(|e| ConfigError::MappingFailure(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceKind;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct TestConfig {
        name: String,
        level: String,
        limits: Limits,
    }

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct Limits {
        max_connections: u32,
    }

    struct MockStore {
        text: Option<String>,
        format: FileFormat,
    }

    #[async_trait]
    impl ConfigStore for MockStore {
        async fn read_raw(&self) -> Result<String> {
            self.text
                .clone()
                .ok_or_else(|| ConfigError::SourceUnavailable("mock is offline".to_string()))
        }

        fn format(&self) -> FileFormat {
            self.format
        }

        fn kind(&self) -> SourceKind {
            SourceKind::Local
        }

        fn name(&self) -> String {
            "mock".to_string()
        }
    }

    fn store(text: &str) -> MockStore {
        MockStore {
            text: Some(text.to_string()),
            format: FileFormat::Yaml,
        }
    }

    #[tokio::test]
    async fn test_reload_maps_nested_case_insensitive() {
        let store = store("Name: svc1\nLevel: info\nLimits:\n  MAX_CONNECTIONS: 10\n");
        let config: TestConfig = reload(&store).await.into_result().unwrap();
        assert_eq!(config.name, "svc1");
        assert_eq!(config.level, "info");
        assert_eq!(config.limits.max_connections, 10);
    }

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct ListenerConfig {
        listen_port: u16,
        #[serde(rename = "maxConns")]
        max_connections: u32,
    }

    #[tokio::test]
    async fn test_reload_maps_renamed_fields() {
        let exact: ListenerConfig = reload(&store("listenPort: 8080\nmaxConns: 64\n"))
            .await
            .into_result()
            .unwrap();
        let folded: ListenerConfig = reload(&store("LISTENPORT: 8080\nmaxconns: 64\n"))
            .await
            .into_result()
            .unwrap();
        assert_eq!(exact, folded);
        assert_eq!(exact.listen_port, 8080);
        assert_eq!(exact.max_connections, 64);
    }

    #[test]
    fn test_serialized_renamed_fields_decode_again() {
        let config = ListenerConfig {
            listen_port: 9090,
            max_connections: 8,
        };
        for format in [FileFormat::Yaml, FileFormat::Json, FileFormat::Toml] {
            let text = format.serialize(&config).unwrap();
            let back: ListenerConfig = decode(&text, format).unwrap();
            assert_eq!(back, config, "format {}", format);
        }
    }

    #[tokio::test]
    async fn test_reload_twice_is_identical() {
        let store = store("name: svc1\nlevel: info\nlimits:\n  max_connections: 10\n");
        let first: TestConfig = reload(&store).await.into_result().unwrap();
        let second: TestConfig = reload(&store).await.into_result().unwrap();
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let store = MockStore {
            text: None,
            format: FileFormat::Yaml,
        };
        let outcome: ReloadOutcome<TestConfig> = reload(&store).await;
        assert!(matches!(
            outcome,
            ReloadOutcome::Failure(ConfigError::SourceUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_content() {
        let store = MockStore {
            text: Some("{ \"name\": ".to_string()),
            format: FileFormat::Json,
        };
        let outcome: ReloadOutcome<TestConfig> = reload(&store).await;
        assert!(matches!(
            outcome,
            ReloadOutcome::Failure(ConfigError::ParseFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_type_mismatch() {
        let store = store("name: svc1\nlevel: info\nlimits:\n  max_connections: lots\n");
        let outcome: ReloadOutcome<TestConfig> = reload(&store).await;
        assert!(matches!(
            outcome,
            ReloadOutcome::Failure(ConfigError::MappingFailure(_))
        ));
    }

    #[test]
    fn test_outcome_from_result() {
        let ok: ReloadOutcome<u8> = Ok(1).into();
        assert!(ok.is_success());
        let err: ReloadOutcome<u8> = Err(ConfigError::CallbackRejection).into();
        assert!(!err.is_success());
    }
}
