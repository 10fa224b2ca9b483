//! `manifest.json` in the layout `docker load` reads

use crate::error::Result;
use crate::image::digest::DigestUtils;
use crate::image::manifest::ImageManifest;
use crate::image::reference::ImageReference;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const LEGACY_MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyManifestEntry {
    #[serde(rename = "Config")]
    pub config: String,
    #[serde(rename = "Layers")]
    pub layers: Vec<String>,
    #[serde(rename = "RepoTags")]
    pub repo_tags: Vec<String>,
}

impl LegacyManifestEntry {
    /// Entry for one image; layer paths keep the manifest's order
    pub fn from_manifest(reference: &ImageReference, manifest: &ImageManifest) -> Self {
        Self {
            config: DigestUtils::config_file_name(&manifest.config.digest),
            layers: manifest
                .layers
                .iter()
                .map(|layer| DigestUtils::layer_tar_path(&layer.digest))
                .collect(),
            repo_tags: vec![reference.repo_tag()],
        }
    }

    /// The file holds a JSON array with this single entry
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&[self])?)
    }

    pub async fn write_to(&self, workspace_dir: &Path) -> Result<PathBuf> {
        let path = workspace_dir.join(LEGACY_MANIFEST_FILE);
        tokio::fs::write(&path, self.to_json()?).await?;
        Ok(path)
    }
}
