use crate::logstore::history::{HistoryOptions, DEFAULT_CLOCK_SKEWED_LOGGER};
use crate::logstore::tail::{TailOptions, DEFAULT_POLL_INTERVAL};
use crate::logstore::ApiGeneration;
use crate::transport::retry::DEFAULT_MAX_ATTEMPTS;
use crate::transport::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub log_store: LogStoreConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub tail: TailConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

impl Config {
    /// Defaults everywhere, pointed at `uri`
    pub fn for_uri(uri: impl Into<String>) -> Self {
        Self {
            log_store: LogStoreConfig {
                uri: uri.into(),
                generation: GenerationSetting::default(),
            },
            transport: TransportConfig::default(),
            tail: TailConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogStoreConfig {
    pub uri: String,
    #[serde(default)]
    pub generation: GenerationSetting,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationSetting {
    /// Detect from the endpoint URI
    #[default]
    Auto,
    G01,
    G02,
}

impl GenerationSetting {
    /// `None` leaves detection to the endpoint
    pub fn resolve(self) -> Option<ApiGeneration> {
        match self {
            GenerationSetting::Auto => None,
            GenerationSetting::G01 => Some(ApiGeneration::G01),
            GenerationSetting::G02 => Some(ApiGeneration::G02),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(with = "duration_format", default = "default_timeout")]
    pub timeout: Duration,
    /// Name of the environment variable holding the bearer token
    #[serde(default)]
    pub token_env: Option<String>,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            token_env: None,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(with = "duration_format", default = "default_initial_backoff")]
    pub initial_backoff: Duration,
    #[serde(with = "duration_format", default = "default_max_backoff")]
    pub max_backoff: Duration,
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_initial_backoff() -> Duration {
    RetryPolicy::default().initial_backoff
}

fn default_max_backoff() -> Duration {
    RetryPolicy::default().max_backoff
}

fn default_jitter() -> bool {
    true
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
            jitter: default_jitter(),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        RetryPolicy {
            max_attempts: config.max_attempts,
            initial_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
            jitter: config.jitter,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailConfig {
    #[serde(with = "duration_format", default = "default_poll_interval")]
    pub poll_interval: Duration,
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
        }
    }
}

/// Tailing shares the history section's list of clock-skewed loggers
impl From<&Config> for TailOptions {
    fn from(config: &Config) -> Self {
        TailOptions {
            poll_interval: config.tail.poll_interval,
            clock_skewed_loggers: config.history.clock_skewed_loggers.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_clock_skewed_loggers")]
    pub clock_skewed_loggers: Vec<String>,
}

fn default_clock_skewed_loggers() -> Vec<String> {
    vec![DEFAULT_CLOCK_SKEWED_LOGGER.to_string()]
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            clock_skewed_loggers: default_clock_skewed_loggers(),
        }
    }
}

impl From<&HistoryConfig> for HistoryOptions {
    fn from(config: &HistoryConfig) -> Self {
        HistoryOptions {
            clock_skewed_loggers: config.clock_skewed_loggers.clone(),
        }
    }
}

// Custom serde module for duration parsing
pub(crate) mod duration_format {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty duration string".to_string());
        }

        let (value_str, unit) = if let Some(v) = s.strip_suffix("ms") {
            (v, "ms")
        } else if let Some(v) = s.strip_suffix('s') {
            (v, "s")
        } else if let Some(v) = s.strip_suffix('m') {
            (v, "m")
        } else if let Some(v) = s.strip_suffix('h') {
            (v, "h")
        } else {
            return Err(format!("invalid duration format: {}", s));
        };

        let value: u64 = value_str
            .parse()
            .map_err(|_| format!("invalid numeric value: {}", value_str))?;

        let duration = match unit {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value * 60),
            _ => Duration::from_secs(value * 3600),
        };

        Ok(duration)
    }

    pub fn format_duration(d: Duration) -> String {
        let secs = d.as_secs();
        if d.subsec_millis() != 0 || secs == 0 {
            format!("{}ms", d.as_millis())
        } else if secs % 3600 == 0 {
            format!("{}h", secs / 3600)
        } else if secs % 60 == 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }
}
