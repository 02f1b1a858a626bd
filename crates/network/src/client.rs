//! HTTP client wrapper

use crate::error::{NetworkError, NetworkResult};
use narrivo_config::DownloadConfig;
use reqwest::{Client as ReqwestClient, Response};
use std::time::Duration;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Maximum redirects to follow
    pub max_redirects: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            user_agent: format!("Narrivo/{}", env!("CARGO_PKG_VERSION")),
            max_redirects: 10,
        }
    }
}

impl From<&DownloadConfig> for ClientConfig {
    fn from(config: &DownloadConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            user_agent: config.user_agent.clone(),
            ..Self::default()
        }
    }
}

/// HTTP client
///
/// Requests are attempted once; a failed download is only restarted when
/// the caller starts it again.
#[derive(Debug, Clone)]
pub struct Client {
    inner: ReqwestClient,
    config: ClientConfig,
}

impl Client {
    /// Creates a new client with default configuration
    pub fn new() -> NetworkResult<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Creates a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> NetworkResult<Self> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(NetworkError::Http)?;

        Ok(Self {
            inner: client,
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Performs a GET request, failing on non-success status codes
    pub async fn get(&self, url: &str) -> NetworkResult<Response> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(NetworkError::InvalidUrl(url.to_string()));
        }

        let response = self.inner.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.max_redirects, 10);
        assert!(config.user_agent.starts_with("Narrivo/"));
    }

    #[test]
    fn test_config_from_download_section() {
        let downloads = DownloadConfig {
            timeout_secs: 12,
            user_agent: "TestAgent".to_string(),
            ..DownloadConfig::default()
        };
        let config = ClientConfig::from(&downloads);
        assert_eq!(config.timeout, Duration::from_secs(12));
        assert_eq!(config.user_agent, "TestAgent");
    }

    #[test]
    fn test_client_creation() {
        assert!(Client::new().is_ok());
    }

    #[tokio::test]
    async fn test_rejects_non_http_url() {
        let client = Client::new().unwrap();
        let result = client.get("ftp://example.com/book.mp3").await;
        assert!(matches!(result, Err(NetworkError::InvalidUrl(_))));
    }
}
