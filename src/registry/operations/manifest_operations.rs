//! Manifest operations for registry client
//!
//! Resolves an image reference to a single-platform image manifest:
//! - GET /v2/{name}/manifests/{reference} accepting both manifests and indexes
//! - For an index, pick the entry matching the target platform and fetch
//!   that entry by digest, accepting only single-platform manifests

use crate::error::{PullerError, Result};
use crate::image::manifest::{
    ImageManifest, MEDIA_TYPE_DOCKER_MANIFEST, MEDIA_TYPE_DOCKER_MANIFEST_LIST,
    MEDIA_TYPE_OCI_INDEX, MEDIA_TYPE_OCI_MANIFEST, ManifestDocument, TargetPlatform,
};
use crate::image::reference::ImageReference;
use crate::registry::client::RegistryClient;
use crate::registry::transport::FetchRequest;
use tracing::{debug, info};

/// Accept header for the first manifest request
pub fn manifest_accept() -> String {
    [
        MEDIA_TYPE_DOCKER_MANIFEST,
        MEDIA_TYPE_DOCKER_MANIFEST_LIST,
        MEDIA_TYPE_OCI_MANIFEST,
        MEDIA_TYPE_OCI_INDEX,
    ]
    .join(", ")
}

/// Accept header when following an index entry
pub fn platform_manifest_accept() -> String {
    [MEDIA_TYPE_DOCKER_MANIFEST, MEDIA_TYPE_OCI_MANIFEST].join(", ")
}

#[derive(Clone)]
pub struct ManifestOperations {
    client: RegistryClient,
    platform: TargetPlatform,
}

impl ManifestOperations {
    pub fn new(client: RegistryClient, platform: TargetPlatform) -> Self {
        Self { client, platform }
    }

    pub fn platform(&self) -> &TargetPlatform {
        &self.platform
    }

    /// Resolve `reference` to the image manifest for the configured platform
    pub async fn resolve(&self, reference: &ImageReference, token: &str) -> Result<ImageManifest> {
        let document = self
            .fetch_document(reference, reference.reference(), &manifest_accept(), token)
            .await?;

        let index = match document {
            ManifestDocument::Image(manifest) => {
                debug!(image = %reference, "single-platform manifest");
                return Ok(manifest);
            }
            ManifestDocument::Index(index) => index,
        };

        let descriptor = index.select_platform(&self.platform).ok_or_else(|| {
            PullerError::NoMatchingPlatform {
                os: self.platform.os.clone(),
                architecture: self.platform.architecture.clone(),
            }
        })?;
        info!(
            platform = %self.platform,
            digest = %descriptor.digest,
            "selected platform manifest"
        );

        match self
            .fetch_document(reference, &descriptor.digest, &platform_manifest_accept(), token)
            .await?
        {
            ManifestDocument::Image(manifest) => Ok(manifest),
            ManifestDocument::Index(_) => Err(PullerError::Manifest(format!(
                "platform entry {} resolved to another index",
                descriptor.digest
            ))),
        }
    }

    async fn fetch_document(
        &self,
        reference: &ImageReference,
        manifest_ref: &str,
        accept: &str,
        token: &str,
    ) -> Result<ManifestDocument> {
        let request = FetchRequest::new(self.client.manifest_url(reference, manifest_ref))
            .with_accept(accept)
            .with_token(token);

        let response = self
            .client
            .fetch("manifest fetch", &request)
            .await
            .map_err(|e| {
                PullerError::Manifest(format!("fetching manifest {}: {}", manifest_ref, e))
            })?;

        ManifestDocument::parse(&response.body)
    }
}
