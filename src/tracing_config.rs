//! Tracing configuration module for structured logging
//!
//! The binary installs a subscriber here; library code only emits events and
//! opens the spans defined in [`spans`].

#[cfg(feature = "cli")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Dependencies that are noisy below `warn`
const QUIET_DEPENDENCIES: [&str; 4] = ["hyper", "reqwest", "rustls", "h2"];

/// Configuration for tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable console output (default)
    Console,
    /// Console output without colors, for log collectors
    Compact,
    /// JSON structured logging
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Tracing configuration builder
#[derive(Debug)]
pub struct TracingConfig {
    /// Verbosity level (maps to log levels)
    pub verbosity: u8,
    /// Output format
    pub format: TracingFormat,
    /// Environment filter string (overrides verbosity if set)
    pub env_filter: Option<String>,
    /// Identifier of this bot process, logged once at startup
    pub instance_id: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            format: TracingFormat::Console,
            env_filter: None,
            instance_id: None,
        }
    }
}

impl TracingConfig {
    /// Create a new tracing configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity level (0-3+)
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set output format
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Set custom environment filter
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    pub fn with_instance_id<S: Into<String>>(mut self, instance_id: S) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    /// Level for this crate and teloxide at the configured verbosity
    pub fn verbosity_level(&self) -> &'static str {
        match self.verbosity {
            0 => "info",  // Default: requests, outcomes and startup
            1 => "debug", // -v: session transitions and API responses
            _ => "trace", // -vv+: everything
        }
    }

    /// Filter directive derived from verbosity
    ///
    /// HTTP and TLS internals stay at `warn` unless `-vv` or more is given.
    pub fn verbosity_to_filter(&self) -> String {
        let level = self.verbosity_level();
        let mut directives = vec![level.to_string()];
        if self.verbosity < 2 {
            directives.extend(QUIET_DEPENDENCIES.iter().map(|dep| format!("{dep}=warn")));
        }
        directives.join(",")
    }

    /// Initialize tracing subscriber based on configuration
    #[cfg(feature = "cli")]
    pub fn init(self) -> anyhow::Result<()> {
        use tracing_subscriber::fmt;

        let filter = match &self.env_filter {
            Some(env_filter) => EnvFilter::try_new(env_filter)?,
            None => EnvFilter::try_new(self.verbosity_to_filter())?,
        };

        let registry = Registry::default().with(filter);

        match self.format {
            TracingFormat::Console => {
                let fmt_layer = fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_level(true)
                    .compact();

                registry.with(fmt_layer).init();
            },

            TracingFormat::Compact => {
                let fmt_layer = fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(false)
                    .compact();

                registry.with(fmt_layer).init();
            },

            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => {
                let fmt_layer = fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true);

                registry.with(fmt_layer).init();
            },
        }

        if let Some(instance_id) = &self.instance_id {
            tracing::info!(instance_id = %instance_id, "Bot process started");
        }

        Ok(())
    }
}

/// Initialize tracing with CLI-friendly defaults
///
/// `RUST_LOG`, when set, takes precedence over the verbosity flag.
#[cfg(feature = "cli")]
pub fn init_cli_tracing(verbosity: u8, format: TracingFormat) -> anyhow::Result<()> {
    let mut config = TracingConfig::new()
        .with_verbosity(verbosity)
        .with_format(format)
        .with_instance_id(uuid::Uuid::new_v4().to_string());

    if let Ok(filter) = std::env::var(EnvFilter::DEFAULT_ENV) {
        if !filter.trim().is_empty() {
            config = config.with_env_filter(filter);
        }
    }

    config.init()
}

/// Span creation helpers for common operations
pub mod spans {
    use tracing::{Level, Span};

    /// Span covering one image request from InFlight to its final message
    pub fn request(request_id: &uuid::Uuid, requester_id: u64, chat_id: i64) -> Span {
        tracing::span!(
            Level::INFO,
            "request",
            request_id = %request_id,
            requester_id = requester_id,
            chat_id = chat_id
        )
    }

    /// Span covering one call to the processing API
    pub fn external_call(file_name: &str, input_bytes: usize, timeout: std::time::Duration) -> Span {
        tracing::span!(
            Level::INFO,
            "external_call",
            file_name = %file_name,
            input_bytes = input_bytes,
            timeout_ms = timeout.as_millis() as u64
        )
    }
}
