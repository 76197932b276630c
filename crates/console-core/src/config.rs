use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::config_env::{
    optional_trimmed_env, parse_bool_env, parse_f32_env, parse_u32_env, parse_u64_env,
};
use crate::models::ModelSize;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:50001";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_FAST_INTERVAL_MS: u64 = 25;
const DEFAULT_SLOW_INTERVAL_MS: u64 = 250;
const DEFAULT_BURST_BUDGET: u32 = 100;
const DEFAULT_SILENCE_THRESHOLD: f32 = 0.07;
const DEFAULT_SILENCE_DURATION_MS: u64 = 2_000;
const DEFAULT_LANGUAGE: &str = "en";
const DEFAULT_TOGGLE_COOLDOWN_MS: u64 = 300;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid integer in env var {0}")]
    ParseInt(String),
    #[error("invalid number in env var {0}")]
    ParseFloat(String),
    #[error("invalid boolean in env var {0}")]
    ParseBool(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuthCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
    pub basic_auth: Option<BasicAuthCredentials>,
    pub initial_context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub fast_interval_ms: u64,
    pub slow_interval_ms: u64,
    pub burst_budget: u32,
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub silence_threshold: f32,
    pub silence_duration_ms: u64,
    pub model_size: ModelSize,
    pub language: Option<String>,
    pub toggle_cooldown_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub client: ClientConfig,
    pub poller: PollerConfig,
    pub capture: CaptureConfig,
    pub log_json: bool,
}

/// Loads `.env` from the working directory if one exists.
pub fn load_dotenv() -> Result<(), ConfigError> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(ConfigError::InvalidConfiguration(format!(
            "failed to load .env file: {err}"
        ))),
    }
}

impl ConsoleConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            client: ClientConfig::from_env()?,
            poller: PollerConfig::from_env()?,
            capture: CaptureConfig::from_env()?,
            log_json: parse_bool_env("CONSOLE_LOG_JSON", false)?,
        })
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let basic_auth = match (
            optional_trimmed_env("BASIC_AUTH_USERNAME"),
            optional_trimmed_env("BASIC_AUTH_PASSWORD"),
        ) {
            (Some(username), Some(password)) => Some(BasicAuthCredentials { username, password }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::MissingVar("BASIC_AUTH_PASSWORD".into())),
            (None, Some(_)) => return Err(ConfigError::MissingVar("BASIC_AUTH_USERNAME".into())),
        };

        let config = Self {
            base_url: optional_trimmed_env("CONSOLE_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            request_timeout_ms: parse_u64_env(
                "CONSOLE_REQUEST_TIMEOUT_MS",
                DEFAULT_REQUEST_TIMEOUT_MS,
            )?,
            basic_auth,
            initial_context: optional_trimmed_env("CONSOLE_CONTEXT"),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(&self.base_url).map_err(|err| {
            ConfigError::InvalidConfiguration(format!("CONSOLE_BASE_URL is not a valid url: {err}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidConfiguration(
                "CONSOLE_BASE_URL must start with http:// or https://".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "CONSOLE_REQUEST_TIMEOUT_MS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            fast_interval_ms: DEFAULT_FAST_INTERVAL_MS,
            slow_interval_ms: DEFAULT_SLOW_INTERVAL_MS,
            burst_budget: DEFAULT_BURST_BUDGET,
        }
    }
}

impl PollerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            fast_interval_ms: parse_u64_env("POLL_FAST_INTERVAL_MS", DEFAULT_FAST_INTERVAL_MS)?,
            slow_interval_ms: parse_u64_env("POLL_SLOW_INTERVAL_MS", DEFAULT_SLOW_INTERVAL_MS)?,
            burst_budget: parse_u32_env("POLL_BURST_BUDGET", DEFAULT_BURST_BUDGET)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fast_interval_ms > self.slow_interval_ms {
            return Err(ConfigError::InvalidConfiguration(
                "POLL_FAST_INTERVAL_MS must not exceed POLL_SLOW_INTERVAL_MS".to_string(),
            ));
        }
        if self.slow_interval_ms == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "POLL_SLOW_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            silence_threshold: DEFAULT_SILENCE_THRESHOLD,
            silence_duration_ms: DEFAULT_SILENCE_DURATION_MS,
            model_size: ModelSize::Base,
            language: Some(DEFAULT_LANGUAGE.to_string()),
            toggle_cooldown_ms: DEFAULT_TOGGLE_COOLDOWN_MS,
        }
    }
}

impl CaptureConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let model_size = match optional_trimmed_env("CAPTURE_MODEL_SIZE") {
            Some(raw) => raw.parse::<ModelSize>().map_err(|_| {
                ConfigError::InvalidConfiguration(format!(
                    "CAPTURE_MODEL_SIZE must be one of tiny, base, small, medium, large (got '{raw}')"
                ))
            })?,
            None => ModelSize::Base,
        };
        // An explicitly empty language lets the transcriber detect it.
        let language = match env::var("CAPTURE_LANGUAGE") {
            Ok(raw) if raw.trim().is_empty() => None,
            Ok(raw) => Some(raw.trim().to_string()),
            Err(_) => Some(DEFAULT_LANGUAGE.to_string()),
        };

        let config = Self {
            silence_threshold: parse_f32_env(
                "CAPTURE_SILENCE_THRESHOLD",
                DEFAULT_SILENCE_THRESHOLD,
            )?,
            silence_duration_ms: parse_u64_env(
                "CAPTURE_SILENCE_DURATION_MS",
                DEFAULT_SILENCE_DURATION_MS,
            )?,
            model_size,
            language,
            toggle_cooldown_ms: parse_u64_env(
                "CAPTURE_TOGGLE_COOLDOWN_MS",
                DEFAULT_TOGGLE_COOLDOWN_MS,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.silence_threshold) {
            return Err(ConfigError::InvalidConfiguration(
                "CAPTURE_SILENCE_THRESHOLD must be within 0.0..=1.0".to_string(),
            ));
        }
        if self.silence_duration_ms == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "CAPTURE_SILENCE_DURATION_MS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn silence_duration(&self) -> Duration {
        Duration::from_millis(self.silence_duration_ms)
    }

    pub fn toggle_cooldown(&self) -> Duration {
        Duration::from_millis(self.toggle_cooldown_ms)
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    const CONSOLE_VARS: [&str; 14] = [
        "CONSOLE_BASE_URL",
        "CONSOLE_REQUEST_TIMEOUT_MS",
        "BASIC_AUTH_USERNAME",
        "BASIC_AUTH_PASSWORD",
        "CONSOLE_CONTEXT",
        "CONSOLE_LOG_JSON",
        "POLL_FAST_INTERVAL_MS",
        "POLL_SLOW_INTERVAL_MS",
        "POLL_BURST_BUDGET",
        "CAPTURE_SILENCE_THRESHOLD",
        "CAPTURE_SILENCE_DURATION_MS",
        "CAPTURE_TOGGLE_COOLDOWN_MS",
        "CAPTURE_MODEL_SIZE",
        "CAPTURE_LANGUAGE",
    ];

    fn clear_console_env() {
        for key in CONSOLE_VARS {
            // SAFETY: config tests are serialized and no other thread reads these vars.
            unsafe { env::remove_var(key) };
        }
    }

    fn set_env(key: &str, value: &str) {
        // SAFETY: config tests are serialized and no other thread reads these vars.
        unsafe { env::set_var(key, value) };
    }

    #[test]
    #[serial]
    fn defaults_apply_when_env_is_empty() {
        clear_console_env();

        let config = ConsoleConfig::from_env().expect("defaults should be valid");

        assert_eq!(config.client.base_url, "http://127.0.0.1:50001");
        assert_eq!(config.client.basic_auth, None);
        assert_eq!(config.client.initial_context, None);
        assert_eq!(config.poller.fast_interval_ms, 25);
        assert_eq!(config.poller.slow_interval_ms, 250);
        assert_eq!(config.poller.burst_budget, 100);
        assert_eq!(config.capture.model_size, ModelSize::Base);
        assert_eq!(config.capture.language.as_deref(), Some("en"));
        assert_eq!(config.capture.silence_duration_ms, 2_000);
        assert_eq!(config.capture.toggle_cooldown_ms, 300);
        assert!(!config.log_json);
    }

    #[test]
    #[serial]
    fn malformed_values_name_the_offending_variable() {
        clear_console_env();

        set_env("POLL_BURST_BUDGET", "lots");
        let err = PollerConfig::from_env().expect_err("budget is not an integer");
        assert!(matches!(err, ConfigError::ParseInt(ref key) if key == "POLL_BURST_BUDGET"));
        clear_console_env();

        set_env("CAPTURE_SILENCE_THRESHOLD", "quiet");
        let err = CaptureConfig::from_env().expect_err("threshold is not a number");
        assert!(
            matches!(err, ConfigError::ParseFloat(ref key) if key == "CAPTURE_SILENCE_THRESHOLD")
        );
        clear_console_env();

        set_env("CONSOLE_LOG_JSON", "maybe");
        let err = ConsoleConfig::from_env().expect_err("flag is not a boolean");
        assert!(matches!(err, ConfigError::ParseBool(ref key) if key == "CONSOLE_LOG_JSON"));

        set_env("CONSOLE_LOG_JSON", "yes");
        let config = ConsoleConfig::from_env().expect("yes is a valid flag");
        assert!(config.log_json);
        clear_console_env();
    }

    #[test]
    #[serial]
    fn basic_auth_requires_both_halves() {
        clear_console_env();
        set_env("BASIC_AUTH_USERNAME", "admin");

        let err = ClientConfig::from_env().expect_err("password is missing");
        assert!(matches!(err, ConfigError::MissingVar(ref key) if key == "BASIC_AUTH_PASSWORD"));

        set_env("BASIC_AUTH_PASSWORD", "secret");
        let config = ClientConfig::from_env().expect("both credentials are set");
        assert_eq!(
            config.basic_auth,
            Some(BasicAuthCredentials {
                username: "admin".to_string(),
                password: "secret".to_string(),
            })
        );
        clear_console_env();
    }

    #[test]
    #[serial]
    fn empty_language_disables_language_hint() {
        clear_console_env();
        set_env("CAPTURE_LANGUAGE", "  ");
        set_env("CAPTURE_MODEL_SIZE", "small");

        let config = CaptureConfig::from_env().expect("capture config should load");
        assert_eq!(config.language, None);
        assert_eq!(config.model_size, ModelSize::Small);
        clear_console_env();
    }

    #[test]
    #[serial]
    fn unknown_model_size_is_rejected() {
        clear_console_env();
        set_env("CAPTURE_MODEL_SIZE", "huge");

        let err = CaptureConfig::from_env().expect_err("model size is invalid");
        assert!(matches!(err, ConfigError::InvalidConfiguration(_)));
        clear_console_env();
    }

    #[test]
    fn client_config_rejects_non_http_base_url() {
        let config = ClientConfig {
            base_url: "ftp://example.com".to_string(),
            request_timeout_ms: 1_000,
            basic_auth: None,
            initial_context: None,
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn poller_config_rejects_fast_slower_than_slow() {
        let config = PollerConfig {
            fast_interval_ms: 500,
            slow_interval_ms: 250,
            burst_budget: 10,
        };

        assert!(config.validate().is_err());
        assert!(PollerConfig::default().validate().is_ok());
    }
}
