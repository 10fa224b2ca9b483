//! Distribution manifest models
//!
//! Covers the two documents a manifest request can return: a single-platform
//! image manifest (Docker v2 schema 2 or OCI) and a multi-platform index
//! (Docker manifest list or OCI index).

use crate::error::{PullerError, Result};
use crate::image::digest::DigestUtils;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MEDIA_TYPE_DOCKER_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const MEDIA_TYPE_DOCKER_MANIFEST_LIST: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";
pub const MEDIA_TYPE_OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const MEDIA_TYPE_OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";

/// Content-addressed reference to a blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    #[serde(default)]
    pub media_type: String,
    pub digest: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub os: String,
    pub architecture: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

/// Entry of a multi-platform index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestDescriptor {
    #[serde(default)]
    pub media_type: String,
    pub digest: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub platform: Option<Platform>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestIndex {
    pub schema_version: u32,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub manifests: Vec<ManifestDescriptor>,
}

impl ManifestIndex {
    /// First entry whose platform os and architecture equal the target exactly
    pub fn select_platform(&self, target: &TargetPlatform) -> Option<&ManifestDescriptor> {
        self.manifests.iter().find(|descriptor| {
            descriptor
                .platform
                .as_ref()
                .is_some_and(|platform| target.matches(platform))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    pub schema_version: u32,
    #[serde(default)]
    pub media_type: Option<String>,
    pub config: Descriptor,
    /// Base layer first; order is significant
    pub layers: Vec<Descriptor>,
}

/// os/architecture pair used to pick an entry out of a manifest index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPlatform {
    pub os: String,
    pub architecture: String,
}

impl TargetPlatform {
    pub fn new(os: impl Into<String>, architecture: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            architecture: architecture.into(),
        }
    }

    pub fn matches(&self, platform: &Platform) -> bool {
        platform.os == self.os && platform.architecture == self.architecture
    }
}

impl Default for TargetPlatform {
    fn default() -> Self {
        Self::new("linux", "amd64")
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)
    }
}

/// A manifest response, classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestDocument {
    Index(ManifestIndex),
    Image(ImageManifest),
}

impl ManifestDocument {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(data)
            .map_err(|e| PullerError::Manifest(format!("response is not valid JSON: {}", e)))?;

        let schema_version = value
            .get("schemaVersion")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| PullerError::Manifest("missing schemaVersion".to_string()))?;
        if schema_version != 2 {
            return Err(PullerError::Manifest(format!(
                "unsupported manifest schema version {}",
                schema_version
            )));
        }

        let media_type = value.get("mediaType").and_then(|v| v.as_str());
        let is_index = matches!(
            media_type,
            Some(MEDIA_TYPE_DOCKER_MANIFEST_LIST) | Some(MEDIA_TYPE_OCI_INDEX)
        ) || (media_type.is_none() && value.get("manifests").is_some());

        if is_index {
            let index: ManifestIndex = serde_json::from_value(value)
                .map_err(|e| PullerError::Manifest(format!("malformed manifest index: {}", e)))?;
            for descriptor in &index.manifests {
                DigestUtils::validate(&descriptor.digest)?;
            }
            Ok(ManifestDocument::Index(index))
        } else {
            let manifest: ImageManifest = serde_json::from_value(value)
                .map_err(|e| PullerError::Manifest(format!("malformed image manifest: {}", e)))?;
            DigestUtils::validate(&manifest.config.digest)?;
            for layer in &manifest.layers {
                DigestUtils::validate(&layer.digest)?;
            }
            Ok(ManifestDocument::Image(manifest))
        }
    }
}
