//! Configuration types for the bot and its processing API client

use crate::error::{BotError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable holding the Telegram bot token
pub const ENV_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
/// Environment variable holding the remove.bg API key
pub const ENV_API_KEY: &str = "REMOVEBG_API_KEY";
/// Environment variable overriding the processing endpoint
pub const ENV_API_URL: &str = "REMOVEBG_API_URL";
/// Environment variable overriding the processing timeout, in seconds
pub const ENV_TIMEOUT_SECS: &str = "REMOVEBG_TIMEOUT_SECS";
/// Environment variable overriding the progress cadence, in seconds
pub const ENV_PROGRESS_INTERVAL_SECS: &str = "PROGRESS_INTERVAL_SECS";
/// Environment variable overriding the requested output size
pub const ENV_OUTPUT_SIZE: &str = "REMOVEBG_SIZE";

/// Default remove.bg endpoint
pub const DEFAULT_API_URL: &str = "https://api.remove.bg/v1.0/removebg";
/// Default ceiling for one processing call
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Upper bound accepted for the processing timeout
pub const MAX_TIMEOUT_SECS: u64 = 120;
/// Default progress cadence
pub const DEFAULT_PROGRESS_INTERVAL_SECS: u64 = 3;
/// Upper bound accepted for the progress cadence
pub const MAX_PROGRESS_INTERVAL_SECS: u64 = 60;

/// Output size requested from the processing API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputSize {
    /// Highest resolution available for the account's credits
    #[default]
    Auto,
    /// Low resolution preview (free tier)
    Preview,
    /// Full resolution
    Full,
}

impl OutputSize {
    /// Form value sent in the `size` field
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Preview => "preview",
            Self::Full => "full",
        }
    }
}

impl std::fmt::Display for OutputSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OutputSize {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "preview" | "small" | "regular" => Ok(Self::Preview),
            "full" | "4k" => Ok(Self::Full),
            other => Err(BotError::invalid_config(format!(
                "Unknown output size '{}'. Expected one of: auto, preview, full",
                other
            ))),
        }
    }
}

/// Complete bot configuration
///
/// Secrets are redacted from the `Debug` output.
#[derive(Clone)]
pub struct BotConfig {
    /// Bot token from BotFather
    pub bot_token: String,
    /// remove.bg API key, sent as `X-Api-Key`
    pub api_key: String,
    /// Processing endpoint
    pub api_url: String,
    /// Ceiling for one processing call, including reading the response body
    pub request_timeout: Duration,
    /// Cadence of "still working" signals
    pub progress_interval: Duration,
    /// Output size requested from the API
    pub output_size: OutputSize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_key: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            progress_interval: Duration::from_secs(DEFAULT_PROGRESS_INTERVAL_SECS),
            output_size: OutputSize::default(),
        }
    }
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("bot_token", &redact(&self.bot_token))
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("request_timeout", &self.request_timeout)
            .field("progress_interval", &self.progress_interval)
            .field("output_size", &self.output_size)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl BotConfig {
    /// Create a builder for `BotConfig`
    #[must_use]
    pub fn builder() -> BotConfigBuilder {
        BotConfigBuilder::default()
    }

    /// Load configuration from the process environment
    ///
    /// Fails when either secret is missing or blank, or when an optional
    /// setting does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bot_token = value(ENV_BOT_TOKEN)
            .ok_or_else(|| BotError::missing_env(ENV_BOT_TOKEN, "Telegram bot token"))?;
        let api_key = value(ENV_API_KEY)
            .ok_or_else(|| BotError::missing_env(ENV_API_KEY, "remove.bg API key"))?;

        let mut builder = Self::builder().bot_token(bot_token).api_key(api_key);

        if let Some(url) = value(ENV_API_URL) {
            builder = builder.api_url(url);
        }
        if let Some(secs) = value(ENV_TIMEOUT_SECS) {
            builder = builder.request_timeout(Duration::from_secs(parse_secs(ENV_TIMEOUT_SECS, &secs)?));
        }
        if let Some(secs) = value(ENV_PROGRESS_INTERVAL_SECS) {
            builder = builder.progress_interval(Duration::from_secs(parse_secs(
                ENV_PROGRESS_INTERVAL_SECS,
                &secs,
            )?));
        }
        if let Some(size) = value(ENV_OUTPUT_SIZE) {
            builder = builder.output_size(size.parse()?);
        }

        builder.build()
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            return Err(BotError::missing_env(ENV_BOT_TOKEN, "Telegram bot token"));
        }

        if self.api_key.trim().is_empty() {
            return Err(BotError::missing_env(ENV_API_KEY, "remove.bg API key"));
        }

        let url = reqwest::Url::parse(&self.api_url).map_err(|e| {
            BotError::invalid_config(format!("Invalid API URL '{}': {}", self.api_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(BotError::invalid_config(format!(
                "API URL must use http or https, got '{}'",
                url.scheme()
            )));
        }

        let timeout = self.request_timeout.as_secs();
        if !(1..=MAX_TIMEOUT_SECS).contains(&timeout) {
            return Err(BotError::config_value_error(
                "request timeout (seconds)",
                timeout,
                &format!("1-{}", MAX_TIMEOUT_SECS),
                Some(DEFAULT_TIMEOUT_SECS),
            ));
        }

        let interval = self.progress_interval.as_secs();
        if !(1..=MAX_PROGRESS_INTERVAL_SECS).contains(&interval) {
            return Err(BotError::config_value_error(
                "progress interval (seconds)",
                interval,
                &format!("1-{}", MAX_PROGRESS_INTERVAL_SECS),
                Some(DEFAULT_PROGRESS_INTERVAL_SECS),
            ));
        }

        Ok(())
    }
}

fn parse_secs(variable: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>().map_err(|_| {
        BotError::invalid_config(format!(
            "{} must be a whole number of seconds, got '{}'",
            variable, raw
        ))
    })
}

/// Builder for `BotConfig`
#[derive(Debug, Default)]
pub struct BotConfigBuilder {
    config: BotConfig,
}

impl BotConfigBuilder {
    /// Set bot token
    #[must_use]
    pub fn bot_token<S: Into<String>>(mut self, token: S) -> Self {
        self.config.bot_token = token.into();
        self
    }

    /// Set API key
    #[must_use]
    pub fn api_key<S: Into<String>>(mut self, key: S) -> Self {
        self.config.api_key = key.into();
        self
    }

    /// Set processing endpoint
    #[must_use]
    pub fn api_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.api_url = url.into();
        self
    }

    /// Set processing timeout, clamped to 1-120 seconds
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout.clamp(
            Duration::from_secs(1),
            Duration::from_secs(MAX_TIMEOUT_SECS),
        );
        self
    }

    /// Set progress cadence, clamped to 1-60 seconds
    #[must_use]
    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.config.progress_interval = interval.clamp(
            Duration::from_secs(1),
            Duration::from_secs(MAX_PROGRESS_INTERVAL_SECS),
        );
        self
    }

    /// Set requested output size
    #[must_use]
    pub fn output_size(mut self, size: OutputSize) -> Self {
        self.config.output_size = size;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// - Missing bot token or API key
    /// - Malformed API URL
    pub fn build(self) -> Result<BotConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = BotConfig::from_lookup(lookup_from(&[
            (ENV_BOT_TOKEN, "123:abc"),
            (ENV_API_KEY, "key"),
        ]))
        .unwrap();

        assert_eq!(config.bot_token, "123:abc");
        assert_eq!(config.api_key, "key");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.progress_interval, Duration::from_secs(3));
        assert_eq!(config.output_size, OutputSize::Auto);
    }

    #[test]
    fn test_missing_secrets_fail_fast() {
        let err = BotConfig::from_lookup(lookup_from(&[(ENV_API_KEY, "key")])).unwrap_err();
        assert!(err.to_string().contains(ENV_BOT_TOKEN));

        let err = BotConfig::from_lookup(lookup_from(&[(ENV_BOT_TOKEN, "123:abc")])).unwrap_err();
        assert!(err.to_string().contains(ENV_API_KEY));

        // Blank values count as absent
        let err = BotConfig::from_lookup(lookup_from(&[
            (ENV_BOT_TOKEN, "123:abc"),
            (ENV_API_KEY, "   "),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains(ENV_API_KEY));
    }

    #[test]
    fn test_optional_overrides() {
        let config = BotConfig::from_lookup(lookup_from(&[
            (ENV_BOT_TOKEN, "123:abc"),
            (ENV_API_KEY, "key"),
            (ENV_API_URL, "http://localhost:8080/removebg"),
            (ENV_TIMEOUT_SECS, "45"),
            (ENV_PROGRESS_INTERVAL_SECS, "5"),
            (ENV_OUTPUT_SIZE, "preview"),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "http://localhost:8080/removebg");
        assert_eq!(config.request_timeout, Duration::from_secs(45));
        assert_eq!(config.progress_interval, Duration::from_secs(5));
        assert_eq!(config.output_size, OutputSize::Preview);
    }

    #[test]
    fn test_unparseable_override_is_rejected() {
        let err = BotConfig::from_lookup(lookup_from(&[
            (ENV_BOT_TOKEN, "123:abc"),
            (ENV_API_KEY, "key"),
            (ENV_TIMEOUT_SECS, "soon"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains(ENV_TIMEOUT_SECS));
        assert!(err.to_string().contains("soon"));
    }

    #[test]
    fn test_builder_clamping() {
        let config = BotConfig::builder()
            .bot_token("t")
            .api_key("k")
            .request_timeout(Duration::from_secs(600))
            .progress_interval(Duration::ZERO)
            .build()
            .unwrap();

        assert_eq!(config.request_timeout, Duration::from_secs(MAX_TIMEOUT_SECS));
        assert_eq!(config.progress_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_validation_after_construction() {
        let mut config = BotConfig::builder().bot_token("t").api_key("k").build().unwrap();
        config.request_timeout = Duration::from_secs(500);

        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("request timeout"));
        assert!(error.to_string().contains("500"));
        assert!(error.to_string().contains("1-120"));

        let mut config = BotConfig::builder().bot_token("t").api_key("k").build().unwrap();
        config.api_url = "ftp://example.com/removebg".to_string();
        assert!(config.validate().is_err());

        config.api_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = BotConfig::builder()
            .bot_token("123:very-secret-token")
            .api_key("api-secret")
            .build()
            .unwrap();

        let debug = format!("{:?}", config);
        assert!(!debug.contains("very-secret-token"));
        assert!(!debug.contains("api-secret"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains(DEFAULT_API_URL));
    }

    #[test]
    fn test_output_size_parsing() {
        assert_eq!("AUTO".parse::<OutputSize>().unwrap(), OutputSize::Auto);
        assert_eq!("full".parse::<OutputSize>().unwrap(), OutputSize::Full);
        assert_eq!("regular".parse::<OutputSize>().unwrap(), OutputSize::Preview);
        assert!("huge".parse::<OutputSize>().is_err());
        assert_eq!(OutputSize::Full.to_string(), "full");
    }
}
