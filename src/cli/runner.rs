//! Runner: builds the registry client from arguments and pulls every image

use crate::cli::args::Args;
use crate::cli::config::PullConfig;
use crate::error::{PullerError, Result};
use crate::image::{ImageManager, PullReport};
use crate::logging::format_duration;
use crate::registry::RegistryClientBuilder;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct Runner {
    args: Args,
    config: PullConfig,
}

impl Runner {
    pub fn new(args: Args) -> Result<Self> {
        args.validate().map_err(PullerError::Validation)?;
        let config = args.to_config();
        config.validate()?;
        Ok(Self { args, config })
    }

    pub fn config(&self) -> &PullConfig {
        &self.config
    }

    /// Pull all requested images. Individual failures are reported in the
    /// returned [`PullReport`], not as an error.
    pub async fn run(&self) -> Result<PullReport> {
        let start_time = Instant::now();
        debug!(config = ?self.config, "starting");
        match &self.config.proxy {
            Some(proxy) => info!(proxy = %proxy, platform = %self.config.platform, "using proxy"),
            None => info!(platform = %self.config.platform, "connecting without proxy"),
        }

        let client = RegistryClientBuilder::from_config(&self.config).build()?;
        let manager = ImageManager::new(client, &self.config);
        let report = manager.pull_images(&self.args.images).await;

        for (image, path) in report.succeeded() {
            info!(image = %image, archive = %path.display(), "saved");
        }

        let failed = report.failed().count();
        let summary = format!(
            "{} of {} images pulled in {}",
            report.outcomes.len() - failed,
            report.outcomes.len(),
            format_duration(start_time.elapsed())
        );
        if failed == 0 {
            info!("{}", summary);
        } else {
            warn!("{}", summary);
        }

        Ok(report)
    }
}
