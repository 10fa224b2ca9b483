//! Layer post-processing: turn a downloaded layer blob into `layer.tar`

use crate::error::{PullerError, Result};
use crate::image::digest::LAYER_TAR_FILE;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the raw blob as downloaded, before processing
pub const COMPRESSED_LAYER_FILE: &str = "layer.tar.gz";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Check whether a file starts with the gzip magic bytes
pub fn is_gzipped(path: &Path) -> io::Result<bool> {
    let mut header = [0u8; 2];
    let mut file = File::open(path)?;
    match file.read_exact(&mut header) {
        Ok(()) => Ok(header == GZIP_MAGIC),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Decompress a gzip stream into `destination`, returning the bytes written.
/// Concatenated gzip members are decoded as one stream.
pub fn decompress_layer(source: &Path, destination: &Path) -> Result<u64> {
    let input = File::open(source)?;
    let mut decoder = MultiGzDecoder::new(BufReader::new(input));
    let mut output = BufWriter::new(File::create(destination)?);

    let written = io::copy(&mut decoder, &mut output).map_err(|e| {
        PullerError::Decompress(format!("{}: {}", source.display(), e))
    })?;
    output.flush()?;
    Ok(written)
}

/// Produce `layer.tar` next to the downloaded blob and remove the blob.
///
/// Gzip blobs are decompressed; anything else is already a plain tar and is
/// renamed in place.
pub fn process_layer_dir(layer_dir: &Path) -> Result<PathBuf> {
    let compressed = layer_dir.join(COMPRESSED_LAYER_FILE);
    let tar_path = layer_dir.join(LAYER_TAR_FILE);

    if is_gzipped(&compressed)? {
        let written = decompress_layer(&compressed, &tar_path)?;
        std::fs::remove_file(&compressed)?;
        debug!(path = %tar_path.display(), bytes = written, "layer decompressed");
    } else {
        std::fs::rename(&compressed, &tar_path)?;
        debug!(path = %tar_path.display(), "layer blob is not gzip, kept as-is");
    }

    Ok(tar_path)
}

/// Async wrapper running [`process_layer_dir`] on the blocking pool
pub async fn process_layer(layer_dir: PathBuf) -> Result<PathBuf> {
    tokio::task::spawn_blocking(move || process_layer_dir(&layer_dir))
        .await
        .map_err(|e| PullerError::Task(format!("layer processing task failed: {}", e)))?
}
