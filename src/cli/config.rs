//! Configuration management module

use crate::error::{PullerError, Result};
use crate::image::manifest::TargetPlatform;
use crate::registry::operations::blob_operations::DEFAULT_MAX_CONCURRENT;
use crate::registry::retry::{DEFAULT_INITIAL_DELAY, DEFAULT_MAX_ATTEMPTS, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PROXY: &str = "http://127.0.0.1:7890";
pub const DEFAULT_AUTH_URL: &str = "https://auth.docker.io/token";
pub const DEFAULT_AUTH_SERVICE: &str = "registry.docker.io";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where registry and token requests are sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEndpoints {
    /// URL scheme for `<scheme>://<registry>/v2/...`
    pub scheme: String,
    pub auth_url: String,
    pub auth_service: String,
}

impl Default for RegistryEndpoints {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            auth_service: DEFAULT_AUTH_SERVICE.to_string(),
        }
    }
}

impl RegistryEndpoints {
    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    pub fn with_auth_url(mut self, auth_url: &str) -> Self {
        self.auth_url = auth_url.to_string();
        self
    }

    pub fn with_auth_service(mut self, auth_service: &str) -> Self {
        self.auth_service = auth_service.to_string();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.scheme != "https" && self.scheme != "http" {
            return Err(PullerError::Validation(format!(
                "Invalid registry scheme: {}. Must be http or https",
                self.scheme
            )));
        }
        url::Url::parse(&self.auth_url)?;
        if self.auth_service.is_empty() {
            return Err(PullerError::Validation(
                "Auth service cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for one invocation of the puller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullConfig {
    pub platform: TargetPlatform,
    /// Archives land here; per-image workspaces are created here too
    pub output_dir: PathBuf,
    pub max_concurrent: usize,
    pub retry: RetryPolicy,
    /// Seconds; connect timeout, and total timeout for token/manifest requests
    pub timeout: u64,
    pub proxy: Option<String>,
    pub endpoints: RegistryEndpoints,
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            platform: TargetPlatform::default(),
            output_dir: PathBuf::from("."),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            retry: RetryPolicy::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_INITIAL_DELAY),
            timeout: DEFAULT_TIMEOUT_SECS,
            proxy: Some(DEFAULT_PROXY.to_string()),
            endpoints: RegistryEndpoints::default(),
        }
    }
}

impl PullConfig {
    pub fn with_platform(mut self, platform: TargetPlatform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_endpoints(mut self, endpoints: RegistryEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn validate(&self) -> Result<()> {
        if self.platform.os.is_empty() || self.platform.architecture.is_empty() {
            return Err(PullerError::Validation(
                "Target platform os and architecture cannot be empty".to_string(),
            ));
        }
        if self.max_concurrent == 0 {
            return Err(PullerError::Validation(
                "max_concurrent must be greater than 0".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(PullerError::Validation(
                "retry attempts must be greater than 0".to_string(),
            ));
        }
        if self.timeout == 0 {
            return Err(PullerError::Validation(
                "timeout must be greater than 0".to_string(),
            ));
        }
        if let Some(proxy) = &self.proxy {
            url::Url::parse(proxy)?;
        }
        self.endpoints.validate()
    }
}
