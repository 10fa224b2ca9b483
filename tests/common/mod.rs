//! Shared fixtures for integration tests: synthetic images, a wiremock
//! registry and an in-memory transport.

#![allow(dead_code)]

use async_trait::async_trait;
use docker_image_puller::cli::{PullConfig, RegistryEndpoints};
use docker_image_puller::error::{PullerError, Result};
use docker_image_puller::image::DigestUtils;
use docker_image_puller::image::manifest::{MEDIA_TYPE_DOCKER_MANIFEST, MEDIA_TYPE_OCI_INDEX};
use docker_image_puller::registry::{FetchRequest, FetchResponse, RegistryTransport, RetryPolicy};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "test-token";

/// A blob as served by the registry
#[derive(Debug, Clone)]
pub struct Blob {
    pub digest: String,
    pub bytes: Vec<u8>,
}

impl Blob {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            digest: format!("sha256:{}", DigestUtils::compute_sha256(&bytes)),
            bytes,
        }
    }
}

/// Uncompressed tar holding the given files
pub fn tar_of(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap()
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// A synthetic image: config plus gzip layers, remembering each layer's
/// uncompressed tar
pub struct TestImage {
    pub config: Blob,
    pub layers: Vec<Blob>,
    pub layer_tars: Vec<Vec<u8>>,
}

impl TestImage {
    pub fn new(tag: &str, layer_count: usize) -> Self {
        let config = Blob::new(
            serde_json::to_vec(&json!({
                "architecture": "amd64",
                "os": "linux",
                "config": { "Labels": { "tag": tag } },
                "rootfs": { "type": "layers", "diff_ids": [] }
            }))
            .unwrap(),
        );

        let layer_tars: Vec<Vec<u8>> = (0..layer_count)
            .map(|i| {
                let name = format!("file-{}.txt", i);
                let body = format!("{} layer {}\n", tag, i);
                tar_of(&[(name.as_str(), body.as_bytes())])
            })
            .collect();
        let layers = layer_tars.iter().map(|t| Blob::new(gzip(t))).collect();

        Self {
            config,
            layers,
            layer_tars,
        }
    }

    pub fn manifest(&self) -> Value {
        json!({
            "schemaVersion": 2,
            "mediaType": MEDIA_TYPE_DOCKER_MANIFEST,
            "config": {
                "mediaType": "application/vnd.docker.container.image.v1+json",
                "digest": self.config.digest,
                "size": self.config.bytes.len()
            },
            "layers": self.layers.iter().map(|layer| json!({
                "mediaType": "application/vnd.docker.image.rootfs.diff.tar.gzip",
                "digest": layer.digest,
                "size": layer.bytes.len()
            })).collect::<Vec<_>>()
        })
    }

    pub fn manifest_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(&self.manifest()).unwrap()
    }
}

/// OCI index over `(os, architecture, manifest digest)` entries
pub fn index_of(entries: &[(&str, &str, &str)]) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "schemaVersion": 2,
        "mediaType": MEDIA_TYPE_OCI_INDEX,
        "manifests": entries.iter().map(|(os, arch, digest)| json!({
            "mediaType": "application/vnd.oci.image.manifest.v1+json",
            "digest": digest,
            "size": 1,
            "platform": { "os": os, "architecture": arch }
        })).collect::<Vec<_>>()
    }))
    .unwrap()
}

/// Registry double on a local wiremock server
pub struct TestRegistry {
    pub server: MockServer,
}

impl TestRegistry {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .and(query_param("service", "registry.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": TOKEN })))
            .mount(&server)
            .await;
        Self { server }
    }

    /// `host:port` of the server, usable as an explicit registry in a reference
    pub fn host(&self) -> String {
        self.server.address().to_string()
    }

    pub fn image(&self, name: &str) -> String {
        format!("{}/{}", self.host(), name)
    }

    pub fn config(&self, output_dir: &Path) -> PullConfig {
        PullConfig::default()
            .with_output_dir(output_dir)
            .with_proxy(None)
            .with_retry(RetryPolicy::new(3, Duration::from_millis(10)))
            .with_endpoints(
                RegistryEndpoints::default()
                    .with_scheme("http")
                    .with_auth_url(&format!("{}/token", self.server.uri()))
                    .with_auth_service("registry.test"),
            )
    }

    pub async fn mount_manifest(&self, repository: &str, reference: &str, body: Vec<u8>) {
        Mock::given(method("GET"))
            .and(path(format!("/v2/{}/manifests/{}", repository, reference)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_blob(&self, repository: &str, blob: &Blob, delay: Duration) {
        Mock::given(method("GET"))
            .and(path(format!("/v2/{}/blobs/{}", repository, blob.digest)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(blob.bytes.clone())
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Serve a complete single-platform image under `repository:tag`
    pub async fn mount_image(&self, repository: &str, tag: &str, image: &TestImage) {
        self.mount_manifest(repository, tag, image.manifest_bytes()).await;
        self.mount_blob(repository, &image.config, Duration::ZERO).await;
        for layer in &image.layers {
            self.mount_blob(repository, layer, Duration::ZERO).await;
        }
    }
}

/// Every entry of a tar archive, directories excluded, keyed by name
pub fn read_archive(archive: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut archive = tar::Archive::new(std::fs::File::open(archive).unwrap());
    let mut files = BTreeMap::new();
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        if entry.header().entry_type().is_dir() {
            continue;
        }
        let name = entry.path().unwrap().to_string_lossy().to_string();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        files.insert(name, data);
    }
    files
}

/// File names directly under `dir`, sorted
pub fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

/// In-memory transport that serves canned bodies by URL and records how
/// many blob transfers run at once
#[derive(Default)]
pub struct RecordingTransport {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    transfers: AtomicUsize,
}

impl RecordingTransport {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn serve(&self, url: impl Into<String>, body: Vec<u8>) {
        self.bodies.lock().unwrap().insert(url.into(), body);
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn transfers(&self) -> usize {
        self.transfers.load(Ordering::SeqCst)
    }

    fn body(&self, url: &str) -> Result<Vec<u8>> {
        self.bodies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| PullerError::Registry {
                status: 404,
                message: format!("no canned body for {}", url),
            })
    }
}

#[async_trait]
impl RegistryTransport for RecordingTransport {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        Ok(FetchResponse {
            body: self.body(&request.url)?,
            content_type: None,
        })
    }

    async fn fetch_to_file(&self, request: &FetchRequest, destination: &Path) -> Result<u64> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        self.transfers.fetch_add(1, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        let result = match self.body(&request.url) {
            Ok(body) => tokio::fs::write(destination, &body)
                .await
                .map(|()| body.len() as u64)
                .map_err(PullerError::from),
            Err(e) => Err(e),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
