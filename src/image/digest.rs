//! SHA256 digest utilities for archive layout
//!
//! Layer directories inside the output archive are named by the SHA-256 of
//! the layer's digest *string*, not by the digest's own hash. The same
//! function names the directory on disk and the path written into
//! `manifest.json`; if the two ever disagree the archive will not load.

use crate::error::{PullerError, Result};
use sha2::{Digest, Sha256};

/// File name of the uncompressed layer inside each layer directory
pub const LAYER_TAR_FILE: &str = "layer.tar";

/// Utilities for working with digests in the legacy archive layout
pub struct DigestUtils;

impl DigestUtils {
    /// Compute SHA256 hex digest from byte data
    pub fn compute_sha256(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    /// Compute SHA256 hex digest from string data
    pub fn compute_sha256_str(data: &str) -> String {
        Self::compute_sha256(data.as_bytes())
    }

    /// Hash portion of an algorithm-prefixed digest (`sha256:abc` -> `abc`)
    pub fn hash_portion(digest: &str) -> &str {
        digest
            .split_once(':')
            .map(|(_, hash)| hash)
            .unwrap_or(digest)
    }

    /// Directory name holding one layer: hex SHA-256 of the digest string
    pub fn layer_dir_name(layer_digest: &str) -> String {
        Self::compute_sha256_str(layer_digest)
    }

    /// Layer path as listed in `manifest.json`; always forward slashes
    pub fn layer_tar_path(layer_digest: &str) -> String {
        format!("{}/{}", Self::layer_dir_name(layer_digest), LAYER_TAR_FILE)
    }

    /// Check that `digest` is `<algorithm>:<hex>` with an alphanumeric
    /// algorithm. Digests name files in the workspace, so anything else
    /// (path separators, `..`) is rejected.
    pub fn validate(digest: &str) -> Result<()> {
        let valid = match digest.split_once(':') {
            Some((algorithm, encoded)) => {
                !algorithm.is_empty()
                    && algorithm.bytes().all(|b| b.is_ascii_alphanumeric())
                    && !encoded.is_empty()
                    && encoded.bytes().all(|b| b.is_ascii_hexdigit())
            }
            None => false,
        };
        if valid {
            Ok(())
        } else {
            Err(PullerError::Manifest(format!("invalid digest '{}'", digest)))
        }
    }

    /// Config blob file name at the workspace root
    pub fn config_file_name(config_digest: &str) -> String {
        format!("{}.json", Self::hash_portion(config_digest))
    }
}
