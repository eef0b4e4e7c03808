#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_possible_truncation)]

//! # Background Removal Bot
//!
//! A Telegram bot that removes the background from a photo by forwarding it
//! to the remove.bg API, reporting progress while the call is outstanding.
//!
//! ## Request lifecycle
//!
//! Each requester moves through a small state machine:
//!
//! - **Idle**: images are rejected with a hint to arm first
//! - **Armed**: `/removebg` or the "Remove BG" button was used; the next image is accepted
//! - **InFlight**: the image is being downloaded and processed; further images are refused
//! - **Terminal**: exactly one final message (the result, or an explanation) was sent
//!
//! Leaving `InFlight` always cancels the progress reporter and disarms the
//! requester before the final message is sent, whatever the outcome.
//!
//! ## Architecture
//!
//! - [`session::SessionStore`]: per-requester armed flag, shared across tasks
//! - [`services::ProgressReporter`]: cancellable periodic "still working" task
//! - [`fetcher::ImageFetcher`]: resolves uploaded files to bytes
//! - [`client::BackgroundRemovalClient`]: one bounded multipart call, classified
//!   into a [`outcome::ProcessingOutcome`]
//! - [`workflow::RequestWorkflow`]: the state machine tying them together
//! - [`telegram`]: the teloxide front end and [`transport::Transport`] implementation
//!
//! ## Library usage
//!
//! The workflow only depends on the [`transport::Transport`] and
//! [`client::BackgroundRemover`] traits, so it can be driven without Telegram:
//!
//! ```rust,no_run
//! use bgremove_bot::{BackgroundRemovalClient, BotConfig, RequestWorkflow, Requester};
//! use bgremove_bot::transport::{FileRef, Transport};
//! use std::sync::Arc;
//!
//! # async fn example(transport: Arc<dyn Transport>) -> anyhow::Result<()> {
//! let config = BotConfig::from_env()?;
//! let client = BackgroundRemovalClient::new(&config)?;
//! let workflow = RequestWorkflow::new(transport, Arc::new(client), config.progress_interval);
//!
//! let requester = Requester::new(42, 42);
//! workflow.arm(requester).await?;
//! let report = workflow.handle_image(requester, FileRef::new("file-id")).await?;
//! println!("{report:?}");
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): the `bgremove-bot` executable (argument parsing, subscriber setup)
//! - `tracing-json`: JSON log output

#[cfg(feature = "cli")]
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod messages;
pub mod outcome;
pub mod services;
pub mod session;
pub mod telegram;
pub mod tracing_config;
pub mod transport;
pub mod workflow;

// Public API exports
pub use client::{BackgroundRemovalClient, BackgroundRemover};
pub use config::{BotConfig, BotConfigBuilder, OutputSize};
pub use error::{BotError, Result};
pub use fetcher::{FetchedImage, ImageFetcher};
pub use outcome::{OutcomeKind, ProcessingOutcome};
pub use services::{
    ProcessingStage, ProgressHandle, ProgressReporter, ProgressSink, ProgressUpdate, StageUpdater,
};
pub use session::{ArmOutcome, BeginOutcome, RequesterId, SessionPhase, SessionStore};
pub use telegram::TelegramTransport;
pub use workflow::{Completion, Rejection, RequestWorkflow, Requester, WorkflowReport};

#[cfg(feature = "cli")]
pub use tracing_config::init_cli_tracing;
pub use tracing_config::{spans, TracingConfig, TracingFormat};
