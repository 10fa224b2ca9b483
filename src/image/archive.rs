//! Output archive packaging
//!
//! Bundles a workspace tree into a single tar with entry names relative to
//! the workspace root, which is the layout `docker load` expects.

use crate::error::{PullerError, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tar::{Builder, HeaderMode};

/// Write `source_dir` into a tar at `output`, returning the archive size.
///
/// The archive is assembled under a `.partial` name and renamed into place,
/// so a failure never leaves a truncated `.tar` behind.
pub fn package_directory(source_dir: &Path, output: &Path) -> Result<u64> {
    let partial = partial_path(output);

    let result = write_archive(source_dir, &partial).and_then(|()| {
        fs::rename(&partial, output)?;
        Ok(fs::metadata(output)?.len())
    });

    if result.is_err() {
        let _ = fs::remove_file(&partial);
    }
    result
}

/// Async wrapper running [`package_directory`] on the blocking pool
pub async fn package_workspace(source_dir: PathBuf, output: PathBuf) -> Result<u64> {
    tokio::task::spawn_blocking(move || package_directory(&source_dir, &output))
        .await
        .map_err(|e| PullerError::Task(format!("archive task failed: {}", e)))?
}

fn partial_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    output.with_file_name(name)
}

fn write_archive(source_dir: &Path, archive_path: &Path) -> Result<()> {
    let file = File::create(archive_path)?;
    let mut builder = Builder::new(BufWriter::new(file));
    builder.mode(HeaderMode::Deterministic);

    append_tree(&mut builder, source_dir, "")?;

    let mut writer = builder
        .into_inner()
        .map_err(|e| PullerError::Archive(format!("failed to finish archive: {}", e)))?;
    writer.flush()?;
    Ok(())
}

/// Append the contents of `dir` under `prefix`, in sorted name order.
/// Entry names are joined with `/` on every host.
fn append_tree<W: Write>(builder: &mut Builder<W>, dir: &Path, prefix: &str) -> Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let file_name = entry.file_name();
        let name = file_name.to_str().ok_or_else(|| {
            PullerError::Archive(format!("non UTF-8 file name in {}", dir.display()))
        })?;
        let entry_name = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", prefix, name)
        };

        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            builder
                .append_dir(&entry_name, &path)
                .map_err(|e| PullerError::Archive(format!("{}: {}", entry_name, e)))?;
            append_tree(builder, &path, &entry_name)?;
        } else if file_type.is_file() {
            builder
                .append_path_with_name(&path, &entry_name)
                .map_err(|e| PullerError::Archive(format!("{}: {}", entry_name, e)))?;
        }
    }
    Ok(())
}
