//! Configuration loading and resolution
//!
//! [`AlertConfig`] mirrors the configuration file (YAML or JSON, camelCase
//! keys). [`AlertConfig::resolve`] turns it into an immutable
//! [`DeliveryConfig`]. Resolution looks up the token and channel, validates
//! the template, date format and timezone, and resolves the processors. Every
//! configuration problem therefore surfaces at setup, before the first log
//! call.

use super::buffer::DEFAULT_BUFFER_CAPACITY;
use super::dispatcher::Passthrough;
use super::error::{AlertError, Result};
use super::formatter::{LineFormatter, Timezone, DEFAULT_DATE_FORMAT, DEFAULT_MESSAGE_FORMAT};
use super::processors::{ProcessorRegistry, ResolvedProcessor};
use super::severity::Severity;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Connect and request timeout applied to Slack calls
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(4);

/// Channel used when neither configuration nor environment names one
pub const FALLBACK_CHANNEL: &str = "general";

pub const DEFAULT_API_URL: &str = "https://slack.com";

fn default_timezone() -> String {
    "America/Vancouver".to_string()
}

fn default_token_env_var() -> String {
    "SLACKBOT_TOKEN".to_string()
}

fn default_channel() -> String {
    FALLBACK_CHANNEL.to_string()
}

fn default_channel_env_var() -> String {
    "SLACK_EXCEPTION_CHANNEL".to_string()
}

fn default_message_format() -> String {
    DEFAULT_MESSAGE_FORMAT.to_string()
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

fn default_activation_level() -> String {
    Severity::Notice.to_str().to_string()
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_seconds() -> f64 {
    DEFAULT_TIMEOUT.as_secs_f64()
}

/// Exception logger configuration as read from a file
///
/// # Example
///
/// ```
/// use slack_exception_logger::core::AlertConfig;
///
/// let config = AlertConfig::load_from_str(r#"
/// slackApiToken: xoxb-123
/// defaultChannel: alerts
/// processors: [process_id, uid]
/// "#).unwrap();
///
/// assert_eq!(config.default_channel, "alerts");
/// assert_eq!(config.message_format, "[%datetime%] %message% %context% %extra%");
/// ```
#[derive(Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AlertConfig {
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default)]
    pub slack_api_token: Option<String>,

    #[serde(default = "default_token_env_var")]
    pub slack_api_token_env_var_name: String,

    #[serde(default = "default_channel")]
    pub default_channel: String,

    #[serde(default = "default_channel_env_var")]
    pub channel_env_var_name: String,

    #[serde(default = "default_message_format")]
    pub message_format: String,

    #[serde(default = "default_date_format")]
    pub date_format: String,

    #[serde(default)]
    pub include_stack_trace: bool,

    #[serde(default)]
    pub processors: Vec<String>,

    #[serde(default = "default_activation_level")]
    pub activation_level: String,

    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    #[serde(default)]
    pub passthrough: Passthrough,

    #[serde(default)]
    pub use_attachment: bool,

    #[serde(default)]
    pub include_context_and_extra: bool,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            slack_api_token: None,
            slack_api_token_env_var_name: default_token_env_var(),
            default_channel: default_channel(),
            channel_env_var_name: default_channel_env_var(),
            message_format: default_message_format(),
            date_format: default_date_format(),
            include_stack_trace: false,
            processors: Vec::new(),
            activation_level: default_activation_level(),
            buffer_size: default_buffer_size(),
            passthrough: Passthrough::default(),
            use_attachment: false,
            include_context_and_extra: false,
            api_url: default_api_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl fmt::Debug for AlertConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertConfig")
            .field("timezone", &self.timezone)
            .field("slack_api_token", &self.slack_api_token.as_ref().map(|_| "***"))
            .field("slack_api_token_env_var_name", &self.slack_api_token_env_var_name)
            .field("default_channel", &self.default_channel)
            .field("channel_env_var_name", &self.channel_env_var_name)
            .field("message_format", &self.message_format)
            .field("date_format", &self.date_format)
            .field("include_stack_trace", &self.include_stack_trace)
            .field("processors", &self.processors)
            .field("activation_level", &self.activation_level)
            .field("buffer_size", &self.buffer_size)
            .field("passthrough", &self.passthrough)
            .field("use_attachment", &self.use_attachment)
            .field("include_context_and_extra", &self.include_context_and_extra)
            .field("api_url", &self.api_url)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl AlertConfig {
    /// Load configuration from a file; `.json` files are parsed as JSON,
    /// anything else as YAML
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AlertError::config(
                "config",
                format!("Failed to read config file {}: {}", path.display(), e),
            )
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            serde_json::from_str(&content).map_err(|e| {
                AlertError::config(
                    "config",
                    format!("Failed to parse JSON config {}: {}", path.display(), e),
                )
            })
        } else {
            Self::load_from_str(&content)
        }
    }

    /// Load configuration from a YAML string
    pub fn load_from_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Severity that activates delivery
    pub fn activation_severity(&self) -> Result<Severity> {
        self.activation_level
            .parse()
            .map_err(|e: String| AlertError::config("activationLevel", e))
    }

    /// Resolve with the built-in processors and no explicit channel
    pub fn resolve(&self) -> Result<DeliveryConfig> {
        self.resolve_with(None, &ProcessorRegistry::with_builtins())
    }

    /// Resolve into a [`DeliveryConfig`].
    ///
    /// Token: `slackApiToken`, then the `slackApiTokenEnvVarName` variable.
    /// Channel: `channel`, then the `channelEnvVarName` variable, then
    /// `defaultChannel`, then `general`.
    pub fn resolve_with(
        &self,
        channel: Option<&str>,
        registry: &ProcessorRegistry,
    ) -> Result<DeliveryConfig> {
        self.validate()?;

        let token = non_empty(self.slack_api_token.clone())
            .or_else(|| env_value(&self.slack_api_token_env_var_name))
            .ok_or_else(|| {
                AlertError::config(
                    "slackApiToken",
                    format!(
                        "Slackbot token could not be found in configuration or ${}, so no Slack log messages will be sent",
                        self.slack_api_token_env_var_name
                    ),
                )
            })?;

        let channel = non_empty(channel.map(str::to_string))
            .or_else(|| env_value(&self.channel_env_var_name))
            .or_else(|| non_empty(Some(self.default_channel.clone())))
            .unwrap_or_else(|| FALLBACK_CHANNEL.to_string());

        let timezone: Timezone = self.timezone.parse()?;
        let formatter = LineFormatter::new(
            &self.message_format,
            &self.date_format,
            timezone,
            self.include_stack_trace,
        )?;
        let processors = registry.resolve(&self.processors)?;

        let timeout = self.timeout()?;

        Ok(DeliveryConfig::new(channel, token)
            .with_api_url(self.api_url.trim_end_matches('/'))
            .with_formatter(formatter)
            .with_processors(processors)
            .with_attachment(self.use_attachment, self.include_context_and_extra)
            .with_timeout(timeout))
    }

    /// `timeoutSeconds` as a duration; must be positive and representable
    fn timeout(&self) -> Result<Duration> {
        if !self.timeout_seconds.is_finite() || self.timeout_seconds <= 0.0 {
            return Err(AlertError::config(
                "timeoutSeconds",
                format!("must be a positive number of seconds, got {}", self.timeout_seconds),
            ));
        }
        Duration::try_from_secs_f64(self.timeout_seconds)
            .map_err(|e| AlertError::config("timeoutSeconds", format!("{}: {}", e, self.timeout_seconds)))
    }

    /// Check values that have no meaningful fallback
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(AlertError::config("bufferSize", "must be at least 1"));
        }
        self.timeout()?;
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(AlertError::config(
                "apiUrl",
                format!("must be an http(s) URL, got '{}'", self.api_url),
            ));
        }
        self.activation_severity()?;
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn env_value(name: &str) -> Option<String> {
    if name.is_empty() {
        return None;
    }
    non_empty(std::env::var(name).ok())
}

/// Resolved delivery settings, fixed for the lifetime of a delivery handler
#[derive(Clone)]
pub struct DeliveryConfig {
    pub channel: String,
    token: String,
    pub api_url: String,
    pub formatter: LineFormatter,
    pub processors: Vec<ResolvedProcessor>,
    pub use_attachment: bool,
    pub include_context_and_extra: bool,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl DeliveryConfig {
    /// Settings with default format, no processors and 4 second timeouts
    pub fn new(channel: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            token: token.into(),
            api_url: DEFAULT_API_URL.to_string(),
            formatter: LineFormatter::default(),
            processors: Vec::new(),
            use_attachment: false,
            include_context_and_extra: false,
            connect_timeout: DEFAULT_TIMEOUT,
            request_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    #[must_use]
    pub fn with_formatter(mut self, formatter: LineFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    #[must_use]
    pub fn with_processors(mut self, processors: Vec<ResolvedProcessor>) -> Self {
        self.processors = processors;
        self
    }

    /// Send attachments instead of plain text, optionally with context and
    /// extra as attachment fields
    #[must_use]
    pub fn with_attachment(mut self, use_attachment: bool, include_context_and_extra: bool) -> Self {
        self.use_attachment = use_attachment;
        self.include_context_and_extra = include_context_and_extra;
        self
    }

    /// Set both connect and request timeouts
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self.request_timeout = timeout;
        self
    }

    /// URL of the `chat.postMessage` method
    pub fn post_message_url(&self) -> String {
        format!("{}/api/chat.postMessage", self.api_url.trim_end_matches('/'))
    }
}

impl fmt::Debug for DeliveryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryConfig")
            .field("channel", &self.channel)
            .field("token", &"***")
            .field("api_url", &self.api_url)
            .field("template", &self.formatter.template())
            .field("processors", &self.processors)
            .field("use_attachment", &self.use_attachment)
            .field("include_context_and_extra", &self.include_context_and_extra)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_token() -> AlertConfig {
        AlertConfig {
            slack_api_token: Some("xoxb-test".to_string()),
            slack_api_token_env_var_name: "SEL_UNIT_UNSET_TOKEN".to_string(),
            channel_env_var_name: "SEL_UNIT_UNSET_CHANNEL".to_string(),
            ..AlertConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = AlertConfig::default();
        assert_eq!(config.timezone, "America/Vancouver");
        assert_eq!(config.slack_api_token_env_var_name, "SLACKBOT_TOKEN");
        assert_eq!(config.default_channel, "general");
        assert_eq!(config.channel_env_var_name, "SLACK_EXCEPTION_CHANNEL");
        assert_eq!(config.message_format, "[%datetime%] %message% %context% %extra%");
        assert_eq!(config.date_format, "Y-m-d H:i:s");
        assert!(!config.include_stack_trace);
        assert!(config.processors.is_empty());
        assert_eq!(config.activation_severity().unwrap(), Severity::Notice);
        assert_eq!(config.passthrough, Passthrough::All);
    }

    #[test]
    fn test_empty_yaml_gives_defaults() {
        assert_eq!(AlertConfig::load_from_str("").unwrap(), AlertConfig::default());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = AlertConfig::load_from_str("slackApiTokn: abc").unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_resolve_uses_explicit_token_and_default_channel() {
        let config = AlertConfig {
            default_channel: "ops".to_string(),
            ..config_with_token()
        };
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.token(), "xoxb-test");
        assert_eq!(resolved.channel, "ops");
        assert_eq!(resolved.request_timeout, DEFAULT_TIMEOUT);
        assert_eq!(resolved.connect_timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_channel_precedence() {
        std::env::set_var("SEL_UNIT_CHANNEL_PRECEDENCE", "from-env");
        let config = AlertConfig {
            channel_env_var_name: "SEL_UNIT_CHANNEL_PRECEDENCE".to_string(),
            ..config_with_token()
        };
        let registry = ProcessorRegistry::with_builtins();

        let explicit = config.resolve_with(Some("explicit"), &registry).unwrap();
        assert_eq!(explicit.channel, "explicit");

        let from_env = config.resolve_with(None, &registry).unwrap();
        assert_eq!(from_env.channel, "from-env");

        let blank_default = AlertConfig {
            default_channel: "  ".to_string(),
            ..config_with_token()
        };
        assert_eq!(blank_default.resolve().unwrap().channel, "general");
    }

    #[test]
    fn test_token_from_env() {
        std::env::set_var("SEL_UNIT_TOKEN_FROM_ENV", "xoxb-env");
        let config = AlertConfig {
            slack_api_token: Some(String::new()),
            slack_api_token_env_var_name: "SEL_UNIT_TOKEN_FROM_ENV".to_string(),
            ..config_with_token()
        };
        assert_eq!(config.resolve().unwrap().token(), "xoxb-env");
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let config = AlertConfig {
            slack_api_token: None,
            ..config_with_token()
        };
        let err = config.resolve().unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("SEL_UNIT_UNSET_TOKEN"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad = [
            AlertConfig { buffer_size: 0, ..config_with_token() },
            AlertConfig { timeout_seconds: 0.0, ..config_with_token() },
            AlertConfig { timeout_seconds: 1e30, ..config_with_token() },
            AlertConfig { timeout_seconds: f64::NAN, ..config_with_token() },
            AlertConfig { activation_level: "LOUD".into(), ..config_with_token() },
            AlertConfig { timezone: "Nowhere/Special".into(), ..config_with_token() },
            AlertConfig { message_format: "%msg%".into(), ..config_with_token() },
            AlertConfig { processors: vec!["Monolog".into()], ..config_with_token() },
            AlertConfig { api_url: "slack.com".into(), ..config_with_token() },
        ];
        for config in bad {
            let err = config.resolve().unwrap_err();
            assert!(err.is_config_error(), "expected config error, got {err}");
        }
    }

    #[test]
    fn test_debug_redacts_token() {
        let rendered = format!("{:?}", config_with_token());
        assert!(!rendered.contains("xoxb-test"));
        let rendered = format!("{:?}", config_with_token().resolve().unwrap());
        assert!(!rendered.contains("xoxb-test"));
    }

    #[test]
    fn test_post_message_url() {
        let config = DeliveryConfig::new("general", "t").with_api_url("http://127.0.0.1:9/");
        assert_eq!(config.post_message_url(), "http://127.0.0.1:9/api/chat.postMessage");
    }
}
