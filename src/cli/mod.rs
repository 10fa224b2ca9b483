//! Command line interface module
//!
//! Argument parsing, pull configuration and the runner that drives a batch
//! of image pulls.

pub mod args;
pub mod config;
pub mod runner;

pub use args::Args;
pub use config::{PullConfig, RegistryEndpoints};
pub use runner::Runner;
