//! Registry module for Docker Registry HTTP API v2 / OCI distribution
//!
//! Provides the HTTP transport, retry policy and client used to request
//! tokens, resolve manifests and download blobs.

pub mod client;
pub mod operations;
pub mod retry;
pub mod transport;

pub use client::{RegistryClient, RegistryClientBuilder};
pub use operations::{AuthOperations, BlobOperations, ManifestOperations};
pub use retry::RetryPolicy;
pub use transport::{FetchRequest, FetchResponse, HttpTransport, RegistryTransport};
