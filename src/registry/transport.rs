//! HTTP transport for Docker Registry API v2 / OCI distribution requests
//!
//! The engine only needs two contracts: fetch a response body into memory
//! (tokens, manifests) and stream a response body into a file (blobs).
//! [`RegistryTransport`] captures exactly those, so tests can swap the
//! reqwest-backed [`HttpTransport`] for an in-memory double.

use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{PullerError, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Proxy, Response};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// One GET against the registry or its auth endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub accept: Option<String>,
    pub token: Option<String>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_accept(mut self, accept: &str) -> Self {
        self.accept = Some(accept.to_string());
        self
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

/// OCI/Docker registry transport operations
#[async_trait]
pub trait RegistryTransport: Send + Sync {
    /// Fetch the full response body into memory
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse>;

    /// Stream the response body into `destination`, truncating it first.
    /// Returns the number of bytes written.
    async fn fetch_to_file(&self, request: &FetchRequest, destination: &Path) -> Result<u64>;
}

/// reqwest-backed transport; one connection pool shared by every request
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    request_timeout: Option<Duration>,
}

pub struct HttpTransportBuilder {
    proxy: Option<String>,
    timeout: Option<Duration>,
}

impl HttpTransportBuilder {
    pub fn new() -> Self {
        Self {
            proxy: None,
            timeout: None,
        }
    }

    /// Route all traffic through this proxy; `None` disables proxying,
    /// including any picked up from the environment
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Connect and read timeout for every request, and total timeout for
    /// in-memory fetches. Blob downloads are only bounded per wait for data,
    /// so large layers still complete.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<HttpTransport> {
        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));

        builder = match &self.proxy {
            Some(proxy) => {
                let proxy = Proxy::all(proxy.as_str()).map_err(|e| {
                    PullerError::Validation(format!("invalid proxy URL '{}': {}", proxy, e))
                })?;
                builder.proxy(proxy)
            }
            None => builder.no_proxy(),
        };

        if let Some(timeout) = self.timeout {
            builder = builder.connect_timeout(timeout).read_timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| PullerError::Validation(format!("failed to build HTTP client: {}", e)))?;

        Ok(HttpTransport {
            client,
            request_timeout: self.timeout,
        })
    }
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::new()
    }

    /// Fail with [`PullerError::Timeout`] if `future` makes no progress
    /// within the request timeout
    async fn idle_bounded<F: Future>(&self, future: F, url: &str) -> Result<F::Output> {
        match self.request_timeout {
            Some(timeout) => tokio::time::timeout(timeout, future).await.map_err(|_| {
                PullerError::Timeout(format!("{}: no data received for {:?}", url, timeout))
            }),
            None => Ok(future.await),
        }
    }

    async fn send(&self, request: &FetchRequest, bounded: bool) -> Result<Response> {
        let mut builder = self.client.get(&request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(accept) = &request.accept {
            builder = builder.header(ACCEPT, accept);
        }
        if let Some(token) = &request.token {
            builder = builder.bearer_auth(token);
        }
        if bounded {
            if let Some(timeout) = self.request_timeout {
                builder = builder.timeout(timeout);
            }
        }

        debug!(url = %request.url, "GET");
        let response = self
            .idle_bounded(builder.send(), &request.url)
            .await?
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, &request.url))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error response".to_string());
        Err(HttpErrorHandler::handle_registry_error(
            status,
            &error_text,
            &format!("GET {}", request.url),
        ))
    }
}

#[async_trait]
impl RegistryTransport for HttpTransport {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let response = self.send(request, true).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, &request.url))?;

        Ok(FetchResponse {
            body: body.to_vec(),
            content_type,
        })
    }

    async fn fetch_to_file(&self, request: &FetchRequest, destination: &Path) -> Result<u64> {
        let mut response = self.send(request, false).await?;
        let mut file = tokio::fs::File::create(destination).await?;
        let mut written = 0u64;

        while let Some(chunk) = self
            .idle_bounded(response.chunk(), &request.url)
            .await?
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, &request.url))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(url = %request.url, bytes = written, path = %destination.display(), "saved");
        Ok(written)
    }
}
