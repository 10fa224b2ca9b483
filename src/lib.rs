//! Docker Image Puller Library
//!
//! Pulls images straight from a Docker Registry v2 / OCI distribution
//! endpoint, without a local daemon, and writes each one as a tar archive
//! that `docker load` accepts.

pub mod cli;
pub mod error;
pub mod image;
pub mod logging;
pub mod registry;

pub use cli::{Args, PullConfig, Runner};
pub use error::{PullerError, Result};
pub use image::{ImageManager, ImageReference, PullReport};
pub use registry::{RegistryClient, RegistryClientBuilder};
