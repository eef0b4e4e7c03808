//! Background removal bot entry point
//!
//! Parses arguments, installs tracing and runs the Telegram dispatcher until
//! Ctrl-C.

use super::config::CliConfigBuilder;
use crate::client::BackgroundRemovalClient;
use crate::config::{
    DEFAULT_API_URL, DEFAULT_PROGRESS_INTERVAL_SECS, DEFAULT_TIMEOUT_SECS, ENV_API_KEY,
    ENV_API_URL, ENV_BOT_TOKEN, ENV_OUTPUT_SIZE, ENV_PROGRESS_INTERVAL_SECS, ENV_TIMEOUT_SECS,
};
use crate::telegram::{self, Command, TelegramTransport};
use crate::tracing_config::{init_cli_tracing, TracingFormat};
use crate::workflow::RequestWorkflow;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::sync::Arc;
use teloxide::dispatching::Dispatcher;
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::requests::Requester;
use teloxide::utils::command::BotCommands;
use teloxide::{dptree, Bot};
use tracing::{info, warn};

/// Telegram bot that removes image backgrounds through remove.bg
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bgremove-bot")]
pub struct Cli {
    /// Telegram bot token from BotFather
    #[arg(long, env = ENV_BOT_TOKEN, hide_env_values = true)]
    pub bot_token: String,

    /// remove.bg API key
    #[arg(long, env = ENV_API_KEY, hide_env_values = true)]
    pub api_key: String,

    /// Processing endpoint
    #[arg(long, env = ENV_API_URL, default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Ceiling for one processing call, in seconds (1-120)
    #[arg(long, env = ENV_TIMEOUT_SECS, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Seconds between "still working" updates (1-60)
    #[arg(long, env = ENV_PROGRESS_INTERVAL_SECS, default_value_t = DEFAULT_PROGRESS_INTERVAL_SECS)]
    pub progress_interval_secs: u64,

    /// Output size requested from remove.bg (auto, preview, full)
    #[arg(long, env = ENV_OUTPUT_SIZE, default_value = "auto")]
    pub size: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = CliLogFormat::Console)]
    pub log_format: CliLogFormat,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliLogFormat {
    Console,
    Compact,
    #[cfg(feature = "tracing-json")]
    Json,
}

impl From<CliLogFormat> for TracingFormat {
    fn from(format: CliLogFormat) -> Self {
        match format {
            CliLogFormat::Console => TracingFormat::Console,
            CliLogFormat::Compact => TracingFormat::Compact,
            #[cfg(feature = "tracing-json")]
            CliLogFormat::Json => TracingFormat::Json,
        }
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_cli_tracing(cli.verbose, cli.log_format.into())
        .context("Failed to initialize tracing")?;

    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;
    info!(config = ?config, "Starting background removal bot");

    let remover =
        BackgroundRemovalClient::new(&config).context("Failed to create processing API client")?;

    let bot = Bot::new(&config.bot_token);
    let me = bot
        .get_me()
        .await
        .context("Failed to authenticate with Telegram. Check the bot token")?;
    info!(username = %me.username(), "Bot authenticated");

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!(error = %e, "Could not register the command menu");
    }

    let transport = Arc::new(TelegramTransport::new(bot.clone()));
    let workflow = Arc::new(RequestWorkflow::new(
        transport,
        Arc::new(remover),
        config.progress_interval,
    ));

    info!(
        timeout_secs = config.request_timeout.as_secs(),
        progress_interval_secs = config.progress_interval.as_secs(),
        size = %config.output_size,
        "Listening for updates"
    );

    Dispatcher::builder(bot, telegram::schema())
        .dependencies(dptree::deps![workflow])
        .error_handler(LoggingErrorHandler::with_custom_text(
            "An error has occurred in the dispatcher",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Dispatcher stopped");
    Ok(())
}
