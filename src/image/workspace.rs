//! Per-pull scratch directory
//!
//! A [`Workspace`] is created at the start of one image pull and owns every
//! file the pull writes. Dropping it removes the whole tree, so cleanup runs
//! on success, on early `?` returns and on panics alike.

use crate::error::Result;
use crate::image::digest::DigestUtils;
use crate::image::reference::ImageReference;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
}

impl Workspace {
    /// Create a uniquely named directory under `parent`
    pub async fn create(parent: &Path, reference: &ImageReference) -> Result<Self> {
        tokio::fs::create_dir_all(parent).await?;

        let name = format!(
            ".pull-{}_{}-{}",
            reference.image,
            reference.tag,
            uuid::Uuid::new_v4().simple()
        );
        let path = parent.join(name);
        tokio::fs::create_dir(&path).await?;
        debug!(path = %path.display(), "workspace created");

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory for one layer, named by [`DigestUtils::layer_dir_name`]
    pub fn layer_dir(&self, layer_digest: &str) -> PathBuf {
        self.path.join(DigestUtils::layer_dir_name(layer_digest))
    }

    /// Path of the config blob at the workspace root
    pub fn config_path(&self, config_digest: &str) -> PathBuf {
        self.path.join(DigestUtils::config_file_name(config_digest))
    }
}

impl Drop for Workspace {
    // Removal is synchronous so the tree is gone by the time the pull
    // returns; it briefly blocks the current runtime worker.
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "workspace removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), "failed to remove workspace: {}", e),
        }
    }
}
