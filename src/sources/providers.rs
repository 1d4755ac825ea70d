//! Built-in remote providers: plain HTTP(S) and etcd (v2 keys API).

use super::RemoteProvider;
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use reqwest::{Client, header::HeaderValue};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;

/// Authentication method for HTTP requests.
#[derive(Clone)]
pub enum HttpAuth {
    /// No authentication
    None,
    /// Bearer token authentication
    Bearer(String),
    /// Basic authentication (username, password)
    Basic(String, String),
}

/// HTTP(S) provider.
///
/// Fetches `url + key_path` with a GET request. HTTP has no change channel,
/// so [`watch`](RemoteProvider::watch) re-fetches the document and reports a
/// change when the body differs from the last one fetched.
///
/// # Examples
///
/// ```rust,no_run
/// use cloud_reload::sources::HttpProvider;
/// use std::time::Duration;
///
/// # fn example() -> cloud_reload::error::Result<()> {
/// let provider = HttpProvider::builder()
///     .with_url("https://config.example.com")
///     .with_auth_token("secret-token")
///     .with_timeout(Duration::from_secs(10))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct HttpProvider {
    url: String,
    client: Client,
    auth: HttpAuth,
    last_body: Mutex<Option<Vec<u8>>>,
}

impl HttpProvider {
    /// Create a new builder for constructing an HTTP provider.
    pub fn builder() -> HttpProviderBuilder {
        HttpProviderBuilder::new()
    }

    async fn get(&self, key_path: &str) -> Result<Vec<u8>> {
        let url = join_url(&self.url, key_path);
        let mut request = self.client.get(&url);

        request = match &self.auth {
            HttpAuth::None => request,
            HttpAuth::Bearer(token) => {
                let header_value = HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| ConfigError::InvalidRequest(format!("Invalid bearer token: {}", e)))?;
                request.header("Authorization", header_value)
            }
            HttpAuth::Basic(username, password) => request.basic_auth(username, Some(password)),
        };

        let response = request
            .send()
            .await
            .map_err(|e| ConfigError::SourceUnavailable(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConfigError::SourceUnavailable(format!(
                "HTTP request to {} failed with status {}",
                url, status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ConfigError::SourceUnavailable(format!("HTTP body read failed: {}", e)))?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl RemoteProvider for HttpProvider {
    async fn fetch(&self, key_path: &str) -> Result<Vec<u8>> {
        let body = self.get(key_path).await?;
        *self.last_body.lock().await = Some(body.clone());
        Ok(body)
    }

    async fn watch(&self, key_path: &str) -> Result<bool> {
        let body = self.get(key_path).await?;
        let last = self.last_body.lock().await;
        Ok(last.as_deref() != Some(body.as_slice()))
    }

    fn name(&self) -> String {
        "http".to_string()
    }
}

/// Builder for constructing an [`HttpProvider`].
pub struct HttpProviderBuilder {
    url: Option<String>,
    auth: HttpAuth,
    timeout: Duration,
}

impl HttpProviderBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            url: None,
            auth: HttpAuth::None,
            timeout: Duration::from_secs(10),
        }
    }

    /// Set the base URL; the key path is appended to it.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set Bearer token authentication.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth = HttpAuth::Bearer(token.into());
        self
    }

    /// Set Basic authentication.
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.auth = HttpAuth::Basic(username.into(), password.into());
        self
    }

    /// Set the request timeout. Default is 10 seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the HTTP provider.
    ///
    /// # Errors
    ///
    /// Returns an error if no URL is provided or the HTTP client cannot be built.
    pub fn build(self) -> Result<HttpProvider> {
        let url = self
            .url
            .ok_or_else(|| ConfigError::InvalidRequest("URL is required for HttpProvider".to_string()))?;

        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ConfigError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(HttpProvider {
            url,
            client,
            auth: self.auth,
            last_body: Mutex::new(None),
        })
    }
}

impl Default for HttpProviderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Error code etcd returns when the requested watch index was compacted away.
const ETCD_EVENT_INDEX_CLEARED: u64 = 401;

#[derive(Debug, Deserialize)]
struct EtcdResponse {
    node: Option<EtcdNode>,
    #[serde(rename = "errorCode")]
    error_code: Option<u64>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EtcdNode {
    value: Option<String>,
    #[serde(rename = "modifiedIndex")]
    modified_index: u64,
}

/// etcd provider speaking the v2 keys API.
///
/// [`fetch`](RemoteProvider::fetch) reads `node.value` of the key and
/// remembers its `modifiedIndex`; [`watch`](RemoteProvider::watch) long-polls
/// with `wait=true` from the next index, so it resolves as soon as the key is
/// written.
pub struct EtcdProvider {
    endpoint: String,
    client: Client,
    watch_client: Client,
    modified_index: Mutex<Option<u64>>,
}

impl EtcdProvider {
    /// Create a provider for the etcd endpoint at `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP clients cannot be built.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ConfigError::Other(format!("Failed to create HTTP client: {}", e)))?;
        // Long polls stay open until the key changes.
        let watch_client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ConfigError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
            watch_client,
            modified_index: Mutex::new(None),
        })
    }

    fn keys_url(&self, key_path: &str) -> String {
        format!(
            "{}/v2/keys/{}",
            self.endpoint.trim_end_matches('/'),
            key_path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl RemoteProvider for EtcdProvider {
    async fn fetch(&self, key_path: &str) -> Result<Vec<u8>> {
        let body = self
            .client
            .get(self.keys_url(key_path))
            .send()
            .await
            .map_err(|e| ConfigError::SourceUnavailable(format!("etcd request failed: {}", e)))?
            .bytes()
            .await
            .map_err(|e| ConfigError::SourceUnavailable(format!("etcd body read failed: {}", e)))?;

        let response = parse_etcd_response(&body)?;
        if let Some(code) = response.error_code {
            return Err(ConfigError::SourceUnavailable(format!(
                "etcd error {} for {}: {}",
                code,
                key_path,
                response.message.unwrap_or_default()
            )));
        }

        let node = response.node.ok_or_else(|| {
            ConfigError::SourceUnavailable(format!("etcd returned no node for {}", key_path))
        })?;
        *self.modified_index.lock().await = Some(node.modified_index);

        let value = node.value.ok_or_else(|| {
            ConfigError::SourceUnavailable(format!("etcd key {} is a directory", key_path))
        })?;
        Ok(value.into_bytes())
    }

    async fn watch(&self, key_path: &str) -> Result<bool> {
        let mut url = format!("{}?wait=true", self.keys_url(key_path));
        if let Some(index) = *self.modified_index.lock().await {
            url.push_str(&format!("&waitIndex={}", index + 1));
        }

        let response = match self.watch_client.get(&url).send().await {
            Ok(response) => response,
            Err(e) if e.is_connect() => {
                return Err(ConfigError::SourceUnavailable(format!(
                    "etcd watch failed: {}",
                    e
                )));
            }
            Err(e) => {
                tracing::debug!(error = %e, "etcd watch connection dropped");
                return Ok(false);
            }
        };

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(error = %e, "etcd watch connection dropped");
                return Ok(false);
            }
        };

        match parse_etcd_response(&body) {
            Ok(EtcdResponse {
                error_code: Some(ETCD_EVENT_INDEX_CLEARED),
                ..
            }) => Ok(true),
            Ok(EtcdResponse {
                error_code: Some(code),
                message,
                ..
            }) => Err(ConfigError::WatchError(format!(
                "etcd error {}: {}",
                code,
                message.unwrap_or_default()
            ))),
            Ok(EtcdResponse { node, .. }) => Ok(node.is_some()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> String {
        "etcd".to_string()
    }
}

fn parse_etcd_response(body: &[u8]) -> Result<EtcdResponse> {
    serde_json::from_slice(body)
        .map_err(|e| ConfigError::ParseFailure(format!("Invalid etcd response: {}", e)))
}

fn join_url(base: &str, key_path: &str) -> String {
    if key_path.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        key_path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_builder() {
        let provider = HttpProvider::builder()
            .with_url("https://example.com/config")
            .with_auth_token("token123")
            .with_timeout(Duration::from_secs(5))
            .build();
        assert!(provider.is_ok());
        assert_eq!(provider.unwrap().url, "https://example.com/config");
    }

    #[test]
    fn test_http_builder_no_url() {
        assert!(HttpProvider::builder().build().is_err());
    }

    #[test]
    fn test_http_builder_with_basic_auth() {
        let provider = HttpProvider::builder()
            .with_url("https://example.com/config")
            .with_basic_auth("user", "pass")
            .build();
        assert!(provider.is_ok());
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://h/", "/a/b"), "http://h/a/b");
        assert_eq!(join_url("http://h", "a"), "http://h/a");
        assert_eq!(join_url("http://h/cfg.json", ""), "http://h/cfg.json");
    }

    #[test]
    fn test_etcd_keys_url() {
        let provider = EtcdProvider::new("http://localhost:4001/").unwrap();
        assert_eq!(
            provider.keys_url("/confignew2/test"),
            "http://localhost:4001/v2/keys/confignew2/test"
        );
    }

    #[test]
    fn test_parse_etcd_value() {
        let body = br#"{"action":"get","node":{"key":"/cfg","value":"{\"name\":\"svc1\"}","modifiedIndex":7,"createdIndex":3}}"#;
        let response = parse_etcd_response(body).unwrap();
        let node = response.node.unwrap();
        assert_eq!(node.modified_index, 7);
        assert_eq!(node.value.unwrap(), r#"{"name":"svc1"}"#);
        assert!(response.error_code.is_none());
    }

    #[test]
    fn test_parse_etcd_error() {
        let body = br#"{"errorCode":100,"message":"Key not found","cause":"/cfg","index":12}"#;
        let response = parse_etcd_response(body).unwrap();
        assert_eq!(response.error_code, Some(100));
        assert!(response.node.is_none());
    }

    #[test]
    fn test_parse_etcd_garbage() {
        assert!(parse_etcd_response(b"<html>").is_err());
    }
}
