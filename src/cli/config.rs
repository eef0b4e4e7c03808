//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::config::{BotConfig, OutputSize};
use anyhow::{Context, Result};
use std::time::Duration;

/// Convert CLI arguments to a validated [`BotConfig`]
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build BotConfig from CLI arguments
    ///
    /// Arguments already carry their environment fallbacks, so this only
    /// converts units and validates.
    pub(crate) fn from_cli(cli: &Cli) -> Result<BotConfig> {
        let output_size: OutputSize = cli
            .size
            .parse()
            .with_context(|| format!("Invalid --size '{}'", cli.size))?;

        BotConfig::builder()
            .bot_token(cli.bot_token.clone())
            .api_key(cli.api_key.clone())
            .api_url(cli.api_url.clone())
            .request_timeout(Duration::from_secs(cli.timeout_secs))
            .progress_interval(Duration::from_secs(cli.progress_interval_secs))
            .output_size(output_size)
            .build()
            .context("Invalid configuration")
    }
}
