// RegistryClient ties a transport to the registry endpoints and the retry
// policy. Operations modules build on it for tokens, manifests and blobs.

use crate::cli::config::{PullConfig, RegistryEndpoints};
use crate::error::Result;
use crate::image::reference::ImageReference;
use crate::registry::retry::RetryPolicy;
use crate::registry::transport::{FetchRequest, FetchResponse, HttpTransport, RegistryTransport};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub struct RegistryClientBuilder {
    transport: Option<Arc<dyn RegistryTransport>>,
    endpoints: RegistryEndpoints,
    retry: RetryPolicy,
    proxy: Option<String>,
    timeout: Option<Duration>,
}

impl RegistryClientBuilder {
    pub fn new() -> Self {
        Self {
            transport: None,
            endpoints: RegistryEndpoints::default(),
            retry: RetryPolicy::default(),
            proxy: None,
            timeout: None,
        }
    }

    /// Seed every setting from a [`PullConfig`]
    pub fn from_config(config: &PullConfig) -> Self {
        Self::new()
            .with_endpoints(config.endpoints.clone())
            .with_retry_policy(config.retry)
            .with_proxy(config.proxy.clone())
            .with_timeout(Some(config.timeout_duration()))
    }

    /// Use a prebuilt transport; proxy and timeout are then ignored
    pub fn with_transport(mut self, transport: Arc<dyn RegistryTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_endpoints(mut self, endpoints: RegistryEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<RegistryClient> {
        let transport: Arc<dyn RegistryTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(
                HttpTransport::builder()
                    .with_proxy(self.proxy)
                    .with_timeout(self.timeout)
                    .build()?,
            ),
        };

        Ok(RegistryClient {
            transport,
            endpoints: self.endpoints,
            retry: self.retry,
        })
    }
}

impl Default for RegistryClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct RegistryClient {
    transport: Arc<dyn RegistryTransport>,
    endpoints: RegistryEndpoints,
    retry: RetryPolicy,
}

impl RegistryClient {
    pub fn builder() -> RegistryClientBuilder {
        RegistryClientBuilder::new()
    }

    pub fn endpoints(&self) -> &RegistryEndpoints {
        &self.endpoints
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn v2_base(&self, reference: &ImageReference) -> String {
        format!(
            "{}://{}/v2/{}",
            self.endpoints.scheme,
            reference.registry,
            reference.repository_path()
        )
    }

    /// `<scheme>://<registry>/v2/<repository>/<image>/manifests/<reference>`
    pub fn manifest_url(&self, reference: &ImageReference, manifest_ref: &str) -> String {
        format!("{}/manifests/{}", self.v2_base(reference), manifest_ref)
    }

    /// `<scheme>://<registry>/v2/<repository>/<image>/blobs/<digest>`
    pub fn blob_url(&self, reference: &ImageReference, digest: &str) -> String {
        format!("{}/blobs/{}", self.v2_base(reference), digest)
    }

    /// In-memory GET, retried per the client's policy
    pub async fn fetch(&self, operation_name: &str, request: &FetchRequest) -> Result<FetchResponse> {
        self.retry
            .execute(operation_name, |_| self.transport.fetch(request))
            .await
    }

    /// Streaming GET into `destination`, retried per the client's policy.
    /// Each attempt truncates the file, so a retry never appends to a
    /// partial body.
    pub async fn fetch_to_file(
        &self,
        operation_name: &str,
        request: &FetchRequest,
        destination: &Path,
    ) -> Result<u64> {
        self.retry
            .execute(operation_name, |_| {
                self.transport.fetch_to_file(request, destination)
            })
            .await
    }
}
