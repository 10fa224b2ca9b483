//! Image content handling
//!
//! Reference parsing, manifest models, the on-disk workspace layout and the
//! conversion of downloaded blobs into a `docker load` compatible archive.
//!
//! A pull goes through these pieces in order:
//!
//! 1. [`ImageReference::parse`] splits the user string into registry,
//!    repository, image, tag and optional digest.
//! 2. [`ManifestDocument`] classifies the registry's manifest response.
//! 3. Blobs land in a [`Workspace`]; [`layer`] turns each layer blob into
//!    `layer.tar`.
//! 4. [`LegacyManifestEntry`] writes `manifest.json` and [`archive`]
//!    bundles the workspace into the output tar.
//!
//! [`ImageManager`] drives that sequence per image.

pub mod archive;
pub mod digest;
pub mod image_manager;
pub mod layer;
pub mod legacy;
pub mod manifest;
pub mod reference;
pub mod workspace;

pub use digest::DigestUtils;
pub use image_manager::{ImageManager, PullOutcome, PullReport};
pub use legacy::LegacyManifestEntry;
pub use manifest::{Descriptor, ImageManifest, ManifestDocument, ManifestIndex, TargetPlatform};
pub use reference::ImageReference;
pub use workspace::Workspace;
