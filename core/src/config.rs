//! Client configuration.
//!
//! # Design
//! `BotConfig` is a plain serde struct so it can be built in code, read from
//! `TELEGRAM_*` environment variables, or layered from a TOML file with the
//! environment on top. Sources are merged with figment; defaults always sit
//! at the bottom so a partial file or environment still yields a full config.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::{DEFAULT_API_ENDPOINT, DEFAULT_FILE_ENDPOINT};
use crate::poller::{DEFAULT_BUFFER, DEFAULT_RETRY_DELAY};

/// Prefix for environment overrides, e.g. `TELEGRAM_TOKEN`.
pub const ENV_PREFIX: &str = "TELEGRAM_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("bot token is empty")]
    MissingToken,

    #[error("update buffer must hold at least one update")]
    ZeroBuffer,

    #[error("bad endpoint template: {0}")]
    BadEndpoint(String),

    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub token: String,
    /// Method URL template with `{token}` and `{method}` placeholders.
    pub api_endpoint: String,
    /// Download URL template with `{token}` and `{path}` placeholders.
    pub file_endpoint: String,
    /// Log every request and raw response body.
    pub debug: bool,
    /// Capacity of the update channel.
    pub buffer: usize,
    pub retry_delay_ms: u64,
    pub http_timeout_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            file_endpoint: DEFAULT_FILE_ENDPOINT.to_string(),
            debug: false,
            buffer: DEFAULT_BUFFER,
            retry_delay_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
            http_timeout_secs: 60,
        }
    }
}

// The token is a credential; keep it out of logs.
impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &"<redacted>")
            .field("api_endpoint", &self.api_endpoint)
            .field("file_endpoint", &self.file_endpoint)
            .field("debug", &self.debug)
            .field("buffer", &self.buffer)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}

impl BotConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `TELEGRAM_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Figment::from(Serialized::defaults(Self::default()))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()?;
        Ok(config)
    }

    /// Defaults, then the TOML file at `path`, then the environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        if self.buffer == 0 {
            return Err(ConfigError::ZeroBuffer);
        }
        check_template(&self.api_endpoint, &["{token}", "{method}"])?;
        check_template(&self.file_endpoint, &["{token}", "{path}"])?;
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn with_api_endpoint(mut self, template: impl Into<String>) -> Self {
        self.api_endpoint = template.into();
        self
    }

    pub fn with_file_endpoint(mut self, template: impl Into<String>) -> Self {
        self.file_endpoint = template.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Total time allowed for one call. Long polls get their own timeout on top.
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout_secs = timeout.as_secs();
        self
    }
}

/// The template must hold every placeholder and render to an absolute URL.
fn check_template(template: &str, placeholders: &[&str]) -> Result<(), ConfigError> {
    let mut rendered = template.to_string();
    for placeholder in placeholders {
        if !template.contains(placeholder) {
            return Err(ConfigError::BadEndpoint(format!(
                "{template} is missing {placeholder}"
            )));
        }
        rendered = rendered.replace(placeholder, "x");
    }
    url::Url::parse(&rendered)
        .map_err(|e| ConfigError::BadEndpoint(format!("{template}: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_point_at_public_api() {
        let config = BotConfig::new("123:abc");
        assert_eq!(config.api_endpoint, DEFAULT_API_ENDPOINT);
        assert_eq!(config.buffer, 100);
        assert_eq!(config.retry_delay(), Duration::from_secs(3));
        assert_eq!(config.http_timeout(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn debug_output_hides_token() {
        let rendered = format!("{:?}", BotConfig::new("123:secret"));
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(matches!(
            BotConfig::default().validate(),
            Err(ConfigError::MissingToken)
        ));
        assert!(matches!(
            BotConfig::new("t").with_buffer(0).validate(),
            Err(ConfigError::ZeroBuffer)
        ));
        assert!(matches!(
            BotConfig::new("t")
                .with_api_endpoint("https://example.com/bot{token}")
                .validate(),
            Err(ConfigError::BadEndpoint(_))
        ));
        assert!(matches!(
            BotConfig::new("t")
                .with_api_endpoint("not a url {token} {method}")
                .validate(),
            Err(ConfigError::BadEndpoint(_))
        ));
    }

    #[test]
    fn from_env_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.set_env("TELEGRAM_TOKEN", "42:env");
            jail.set_env("TELEGRAM_BUFFER", "5");
            jail.set_env("TELEGRAM_DEBUG", "true");

            let config = BotConfig::from_env().map_err(|e| e.to_string())?;
            assert_eq!(config.token, "42:env");
            assert_eq!(config.buffer, 5);
            assert!(config.debug);
            assert_eq!(config.file_endpoint, DEFAULT_FILE_ENDPOINT);
            Ok(())
        });
    }

    #[test]
    fn load_layers_file_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "bot.toml",
                r#"
                    token = "42:file"
                    retry_delay_ms = 250
                    api_endpoint = "http://127.0.0.1:8080/bot{token}/{method}"
                "#,
            )?;
            jail.set_env("TELEGRAM_TOKEN", "42:env");

            let config = BotConfig::load("bot.toml").map_err(|e| e.to_string())?;
            assert_eq!(config.token, "42:env");
            assert_eq!(config.retry_delay(), Duration::from_millis(250));
            assert_eq!(
                config.api_endpoint,
                "http://127.0.0.1:8080/bot{token}/{method}"
            );
            assert!(config.validate().is_ok());
            Ok(())
        });
    }

    #[test]
    fn load_reports_malformed_file() {
        Jail::expect_with(|jail| {
            jail.create_file("bot.toml", "buffer = \"many\"")?;
            assert!(matches!(
                BotConfig::load("bot.toml"),
                Err(ConfigError::Load(_))
            ));
            Ok(())
        });
    }
}
