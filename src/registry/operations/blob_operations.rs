//! Blob operations for registry client
//!
//! Implements blob retrieval (GET /v2/{name}/blobs/{digest}) for the config
//! and the layers of an image. Layer downloads fan out over a bounded pool;
//! the resulting paths always follow manifest order.

use crate::error::{PullerError, Result};
use crate::image::layer::{self, COMPRESSED_LAYER_FILE};
use crate::image::manifest::Descriptor;
use crate::image::reference::ImageReference;
use crate::image::workspace::Workspace;
use crate::logging::format_size;
use crate::registry::client::RegistryClient;
use crate::registry::transport::FetchRequest;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Concurrent layer transfers per image
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

#[derive(Clone)]
pub struct BlobOperations {
    client: RegistryClient,
    max_concurrent: usize,
}

impl BlobOperations {
    pub fn new(client: RegistryClient) -> Self {
        Self {
            client,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Save the config blob as `<hash>.json` at the workspace root
    pub async fn download_config(
        &self,
        reference: &ImageReference,
        config: &Descriptor,
        token: &str,
        workspace: &Workspace,
    ) -> Result<PathBuf> {
        let request =
            FetchRequest::new(self.client.blob_url(reference, &config.digest)).with_token(token);
        let destination = workspace.config_path(&config.digest);

        let size = self
            .client
            .fetch_to_file("config download", &request, &destination)
            .await?;
        debug!(digest = %config.digest, size = %format_size(size), "config saved");
        Ok(destination)
    }

    /// Download and unpack every layer into its own workspace subdirectory.
    ///
    /// Returns the `layer.tar` paths in the order of `layers`. On failure the
    /// first error observed is returned once every started task has
    /// finished; tasks still waiting for a slot are skipped.
    pub async fn download_layers(
        &self,
        reference: &ImageReference,
        layers: &[Descriptor],
        token: &str,
        workspace: &Workspace,
    ) -> Result<Vec<PathBuf>> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let failed = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();
        let mut scheduled = HashSet::new();

        for descriptor in layers {
            // A digest listed twice shares one directory; fetch it once
            if !scheduled.insert(descriptor.digest.as_str()) {
                continue;
            }

            let client = self.client.clone();
            let semaphore = semaphore.clone();
            let failed = failed.clone();
            let digest = descriptor.digest.clone();
            let layer_dir = workspace.layer_dir(&digest);
            let request =
                FetchRequest::new(self.client.blob_url(reference, &digest)).with_token(token);

            tasks.spawn(layer_task(client, request, layer_dir, digest, semaphore, failed));
        }

        let mut completed: HashMap<String, PathBuf> = HashMap::new();
        let mut first_error = None;

        while let Some(joined) = tasks.join_next().await {
            let outcome = joined
                .map_err(|e| PullerError::Task(format!("layer task failed: {}", e)))
                .and_then(|result| result);
            match outcome {
                Ok((digest, Some(path))) => {
                    completed.insert(digest, path);
                }
                Ok((_, None)) => {}
                Err(e) => {
                    failed.store(true, Ordering::SeqCst);
                    if first_error.is_none() {
                        first_error = Some(e);
                    } else {
                        warn!("additional layer failure: {}", e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        layers
            .iter()
            .map(|descriptor| {
                completed.get(&descriptor.digest).cloned().ok_or_else(|| {
                    PullerError::Task(format!("layer {} produced no output", descriptor.digest))
                })
            })
            .collect()
    }
}

/// One pool task: wait for a slot, then fetch and unpack unless a sibling
/// has already failed. `None` means the layer was skipped.
async fn layer_task(
    client: RegistryClient,
    request: FetchRequest,
    layer_dir: PathBuf,
    digest: String,
    semaphore: Arc<Semaphore>,
    failed: Arc<AtomicBool>,
) -> Result<(String, Option<PathBuf>)> {
    let permit = semaphore
        .acquire_owned()
        .await
        .map_err(|e| PullerError::Task(format!("download pool closed: {}", e)))?;
    if failed.load(Ordering::SeqCst) {
        debug!(digest = %digest, "skipping layer after earlier failure");
        return Ok((digest, None));
    }

    match fetch_layer(&client, &request, layer_dir, permit, &digest).await {
        Ok(path) => Ok((digest, Some(path))),
        Err(e) => {
            failed.store(true, Ordering::SeqCst);
            Err(e)
        }
    }
}

/// Download one layer blob, release the transfer slot, then unpack it
async fn fetch_layer(
    client: &RegistryClient,
    request: &FetchRequest,
    layer_dir: PathBuf,
    permit: OwnedSemaphorePermit,
    digest: &str,
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(&layer_dir).await?;
    let size = client
        .fetch_to_file(
            "layer download",
            request,
            &layer_dir.join(COMPRESSED_LAYER_FILE),
        )
        .await?;
    drop(permit);
    info!(digest = %digest, size = %format_size(size), "layer downloaded");

    layer::process_layer(layer_dir).await
}
