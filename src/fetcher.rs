use anyhow::{Context, Result};
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client settings for a run.
///
/// Certificate validation is off by default: targets are frequently
/// self-signed or misconfigured hosts, and the content is stored, never
/// executed. Set `accept_invalid_certs` to false to validate chains.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
    /// Sent unless the request headers carry their own `User-Agent`.
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            accept_invalid_certs: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Classified failure of a single GET.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    /// DNS, connect, TLS handshake or a broken body stream.
    #[error("{message}")]
    Network { message: String },
    #[error("{message}")]
    Other { message: String },
}

impl FetchError {
    pub fn classify(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return FetchError::Timeout;
        }
        if let Some(status) = err.status() {
            return FetchError::Other {
                message: format!("HTTP {}", status),
            };
        }
        let message = error_chain(&err);
        if err.is_connect() || err.is_request() || err.is_body() || err.is_redirect() {
            FetchError::Network { message }
        } else {
            FetchError::Other { message }
        }
    }
}

fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Performs single GET requests. No retries happen at this layer.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    /// Fetches `url` and returns the body decoded as text.
    pub async fn fetch(&self, url: &str, headers: &HeaderMap) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .headers(headers.clone())
            .send()
            .await
            .map_err(FetchError::classify)?
            .error_for_status()
            .map_err(FetchError::classify)?;

        response.text().await.map_err(FetchError::classify)
    }
}
