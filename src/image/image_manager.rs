//! Image manager - runs the pull pipeline for each requested image
//!
//! Every image is pulled independently: a failure is recorded against that
//! image and the next one still runs. Each pull owns a [`Workspace`] that is
//! removed however the pull ends.

use crate::cli::config::PullConfig;
use crate::error::{PullerError, Result};
use crate::image::archive;
use crate::image::legacy::LegacyManifestEntry;
use crate::image::reference::ImageReference;
use crate::image::workspace::Workspace;
use crate::logging::{format_duration, format_size};
use crate::registry::RegistryClient;
use crate::registry::operations::{AuthOperations, BlobOperations, ManifestOperations};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};

/// Result of pulling one image name
#[derive(Debug)]
pub struct PullOutcome {
    pub image: String,
    pub result: Result<PathBuf>,
}

/// Per-image results of a batch, in request order
#[derive(Debug, Default)]
pub struct PullReport {
    pub outcomes: Vec<PullOutcome>,
}

impl PullReport {
    pub fn succeeded(&self) -> impl Iterator<Item = (&str, &PathBuf)> {
        self.outcomes.iter().filter_map(|outcome| match &outcome.result {
            Ok(path) => Some((outcome.image.as_str(), path)),
            Err(_) => None,
        })
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &PullerError)> {
        self.outcomes.iter().filter_map(|outcome| match &outcome.result {
            Ok(_) => None,
            Err(e) => Some((outcome.image.as_str(), e)),
        })
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.result.is_ok())
    }
}

pub struct ImageManager {
    auth: AuthOperations,
    manifests: ManifestOperations,
    blobs: BlobOperations,
    output_dir: PathBuf,
}

impl ImageManager {
    pub fn new(client: RegistryClient, config: &PullConfig) -> Self {
        Self {
            auth: AuthOperations::new(client.clone()),
            manifests: ManifestOperations::new(client.clone(), config.platform.clone()),
            blobs: BlobOperations::new(client).with_max_concurrent(config.max_concurrent),
            output_dir: config.output_dir.clone(),
        }
    }

    /// Pull each image in turn; one failure never stops the others
    pub async fn pull_images<S: AsRef<str>>(&self, images: &[S]) -> PullReport {
        let mut report = PullReport::default();

        for image in images {
            let image = image.as_ref();
            let result = self.pull_image(image).await;
            if let Err(e) = &result {
                error!(image = %image, "pull failed: {}", e);
            }
            report.outcomes.push(PullOutcome {
                image: image.to_string(),
                result,
            });
        }

        report
    }

    /// Pull a single image into `<output_dir>/<archive name>`, returning the
    /// archive path. Errors carry the image name.
    pub async fn pull_image(&self, image: &str) -> Result<PathBuf> {
        self.run_pipeline(image)
            .await
            .map_err(|e| e.for_image(image))
    }

    async fn run_pipeline(&self, image: &str) -> Result<PathBuf> {
        let started = Instant::now();
        let reference = ImageReference::parse(image)?;
        info!(image = %reference, "pulling");

        let token = self.auth.request_token(&reference).await?;
        let workspace = Workspace::create(&self.output_dir, &reference).await?;

        let manifest = self.manifests.resolve(&reference, &token).await?;
        info!(
            image = %image,
            layers = manifest.layers.len(),
            config = %manifest.config.digest,
            "manifest resolved"
        );

        LegacyManifestEntry::from_manifest(&reference, &manifest)
            .write_to(workspace.path())
            .await?;
        self.blobs
            .download_config(&reference, &manifest.config, &token, &workspace)
            .await?;
        self.blobs
            .download_layers(&reference, &manifest.layers, &token, &workspace)
            .await?;

        let output = self.output_dir.join(reference.archive_file_name());
        let size =
            archive::package_workspace(workspace.path().to_path_buf(), output.clone()).await?;

        info!(
            image = %image,
            archive = %output.display(),
            size = %format_size(size),
            elapsed = %format_duration(started.elapsed()),
            "pull complete"
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_partitions_outcomes() {
        let report = PullReport {
            outcomes: vec![
                PullOutcome {
                    image: "bad".to_string(),
                    result: Err(PullerError::Manifest("boom".into()).for_image("bad")),
                },
                PullOutcome {
                    image: "nginx".to_string(),
                    result: Ok(PathBuf::from("library_nginx_latest.tar")),
                },
            ],
        };

        assert!(!report.is_success());
        let ok: Vec<_> = report.succeeded().map(|(image, _)| image).collect();
        let failed: Vec<_> = report.failed().map(|(image, _)| image).collect();
        assert_eq!(ok, vec!["nginx"]);
        assert_eq!(failed, vec!["bad"]);
    }

    #[tokio::test]
    async fn test_malformed_reference_fails_without_network() {
        let config = PullConfig::default().with_proxy(None);
        let client = RegistryClient::builder().build().unwrap();
        let manager = ImageManager::new(client, &config);

        let report = manager.pull_images(&["", "nginx:"]).await;
        assert_eq!(report.outcomes.len(), 2);
        for (_, e) in report.failed() {
            match e {
                PullerError::Image { source, .. } => {
                    assert!(matches!(**source, PullerError::Reference { .. }))
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }
    }
}
