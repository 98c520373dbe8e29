use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::config::Config;

/// Errors raised by a single HTTP exchange.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {preview}")]
    Status { status: u16, preview: String },

    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),
}

/// An outgoing GET request with its extra headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// Add a `Cookie` header unless the header value is empty.
    pub fn cookie_header(self, cookie_header: &str) -> Self {
        if cookie_header.is_empty() {
            self
        } else {
            self.header("Cookie", cookie_header)
        }
    }
}

/// Status and decoded body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into a [`FetchError::Status`] carrying a body preview.
    pub fn error_for_status(self) -> Result<Self, FetchError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(FetchError::Status {
                status: self.status,
                preview: crate::utils::preview(&self.body, 300),
            })
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// The network seam used by every platform call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// GET a text resource. Non-2xx statuses are returned, not raised.
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError>;

    /// Stream a binary resource into `target`, returning the number of bytes written.
    async fn download(&self, request: FetchRequest, target: &Path) -> Result<u64, FetchError>;
}

/// reqwest-backed fetcher with separate timeouts for pages and media.
pub struct HttpFetcher {
    client: Client,
    download_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeouts.http_secs))
            .user_agent(config.platform.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            download_timeout: Duration::from_secs(config.timeouts.download_secs),
        })
    }

    fn build(&self, request: &FetchRequest) -> reqwest::RequestBuilder {
        request
            .headers
            .iter()
            .fold(self.client.get(&request.url), |builder, (name, value)| {
                builder.header(name.as_str(), value.as_str())
            })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        let response = self.build(&request).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(FetchResponse { status, body })
    }

    async fn download(&self, request: FetchRequest, target: &Path) -> Result<u64, FetchError> {
        let response = self
            .build(&request)
            .timeout(self.download_timeout)
            .send()
            .await?;

        tracing::debug!(
            "download status={} content-type={} url={}",
            response.status(),
            response
                .headers()
                .get("content-type")
                .and_then(|ct| ct.to_str().ok())
                .unwrap_or(""),
            crate::utils::preview(&request.url, 80)
        );

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                preview: String::new(),
            });
        }

        let mut file = fs_err::File::create(target)?;
        let mut written = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)?;
            written += chunk.len() as u64;
        }
        file.flush()?;

        Ok(written)
    }
}
