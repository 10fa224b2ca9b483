//! Command-line argument parsing

use crate::cli::config::{DEFAULT_PROXY, PullConfig};
use crate::image::manifest::TargetPlatform;
use crate::registry::retry::{DEFAULT_INITIAL_DELAY, RetryPolicy};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "docker-image-puller")]
#[command(about = "Pull container images from a registry into docker-loadable tar archives")]
#[command(version, author)]
pub struct Args {
    /// Images to pull, e.g. nginx, nginx:1.25, ghcr.io/org/app:v1
    #[arg(required = true, value_name = "IMAGE")]
    pub images: Vec<String>,

    /// Target operating system
    #[arg(long = "os", default_value = "linux", help = "Platform OS to select from multi-platform images")]
    pub os: String,

    /// Target architecture
    #[arg(
        long = "arch",
        default_value = "amd64",
        help = "Platform architecture to select from multi-platform images"
    )]
    pub arch: String,

    /// Proxy URL
    #[arg(
        long = "proxy",
        help = "HTTP(S) proxy URL (defaults to $HTTP_PROXY, then http://127.0.0.1:7890)"
    )]
    pub proxy: Option<String>,

    /// Disable proxying
    #[arg(long = "no-proxy", conflicts_with = "proxy", help = "Connect directly without any proxy")]
    pub no_proxy: bool,

    /// Directory for output archives
    #[arg(
        long = "output-dir",
        short = 'o',
        default_value = ".",
        help = "Directory where image archives are written"
    )]
    pub output_dir: PathBuf,

    /// Number of concurrent layer downloads
    #[arg(
        long = "concurrency",
        short = 'j',
        default_value = "4",
        help = "Number of concurrent layer downloads per image"
    )]
    pub concurrency: usize,

    /// Retry attempts for failed requests
    #[arg(
        long = "retry",
        default_value = "3",
        help = "Maximum attempts per registry request"
    )]
    pub retry: u32,

    /// Timeout in seconds for network operations
    #[arg(
        long = "timeout",
        short = 't',
        default_value = "30",
        help = "Timeout for network operations in seconds"
    )]
    pub timeout: u64,

    /// Verbose output
    #[arg(long = "verbose", short = 'v', help = "Enable verbose output")]
    pub verbose: bool,

    /// Only print errors
    #[arg(long = "quiet", short = 'q', conflicts_with = "verbose", help = "Only print errors")]
    pub quiet: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// Validate arguments
    pub fn validate(&self) -> Result<(), String> {
        if self.images.iter().any(|image| image.trim().is_empty()) {
            return Err("Image names cannot be empty".to_string());
        }

        if self.os.is_empty() || self.arch.is_empty() {
            return Err("--os and --arch cannot be empty".to_string());
        }

        if self.concurrency == 0 {
            return Err("Concurrency must be greater than 0".to_string());
        }

        if self.retry == 0 {
            return Err("Retry attempts must be greater than 0".to_string());
        }

        if self.timeout == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        if let Some(proxy) = &self.proxy {
            url::Url::parse(proxy).map_err(|e| format!("Invalid proxy URL '{}': {}", proxy, e))?;
        }

        Ok(())
    }

    /// Fill the proxy from `HTTP_PROXY` when not given on the command line
    pub fn from_env(mut self) -> Self {
        self.proxy = resolve_proxy(
            self.proxy.take(),
            self.no_proxy,
            std::env::var("HTTP_PROXY").ok(),
        );
        self
    }

    pub fn to_config(&self) -> PullConfig {
        PullConfig::default()
            .with_platform(TargetPlatform::new(self.os.as_str(), self.arch.as_str()))
            .with_output_dir(self.output_dir.clone())
            .with_max_concurrent(self.concurrency)
            .with_retry(RetryPolicy::new(self.retry, DEFAULT_INITIAL_DELAY))
            .with_timeout(self.timeout)
            .with_proxy(resolve_proxy(self.proxy.clone(), self.no_proxy, None))
    }
}

/// Proxy precedence: explicit flag, then environment, then the built-in
/// default. `--no-proxy` wins over all of them.
pub fn resolve_proxy(
    explicit: Option<String>,
    no_proxy: bool,
    env_proxy: Option<String>,
) -> Option<String> {
    if no_proxy {
        return None;
    }
    explicit
        .filter(|p| !p.is_empty())
        .or(env_proxy.filter(|p| !p.is_empty()))
        .or_else(|| Some(DEFAULT_PROXY.to_string()))
}
