//! Registry operations built on [`RegistryClient`](crate::registry::client::RegistryClient)

pub mod auth_operations;
pub mod blob_operations;
pub mod manifest_operations;

pub use auth_operations::AuthOperations;
pub use blob_operations::BlobOperations;
pub use manifest_operations::ManifestOperations;
