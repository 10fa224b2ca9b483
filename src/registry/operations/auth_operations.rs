//! Authentication operations for registry client
//!
//! Anonymous bearer-token exchange against the registry's token service:
//! `GET <auth_url>?service=<service>&scope=repository:<name>:pull`.

use crate::error::{PullerError, Result};
use crate::image::reference::ImageReference;
use crate::registry::client::RegistryClient;
use crate::registry::transport::FetchRequest;
use serde::Deserialize;
use tracing::debug;

/// Token service reply. Docker Hub sends `token`; some services only send
/// the OAuth2 `access_token` field.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

impl TokenResponse {
    fn into_token(self) -> Option<String> {
        self.token
            .filter(|t| !t.is_empty())
            .or(self.access_token.filter(|t| !t.is_empty()))
    }
}

#[derive(Clone)]
pub struct AuthOperations {
    client: RegistryClient,
}

impl AuthOperations {
    pub fn new(client: RegistryClient) -> Self {
        Self { client }
    }

    /// Obtain a pull-scoped bearer token for `reference`
    pub async fn request_token(&self, reference: &ImageReference) -> Result<String> {
        let endpoints = self.client.endpoints();
        let scope = reference.pull_scope();
        let request = FetchRequest::new(endpoints.auth_url.as_str())
            .with_query("service", &endpoints.auth_service)
            .with_query("scope", &scope);

        debug!(scope = %scope, "requesting token");
        let response = self
            .client
            .fetch("token request", &request)
            .await
            .map_err(|e| PullerError::Auth(format!("token request for {} failed: {}", scope, e)))?;

        let parsed: TokenResponse = serde_json::from_slice(&response.body)
            .map_err(|e| PullerError::Auth(format!("malformed token response: {}", e)))?;

        parsed
            .into_token()
            .ok_or_else(|| PullerError::Auth("token response contained no token".to_string()))
    }
}
