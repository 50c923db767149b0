use super::types::*;
use crate::config::{expand_env_vars, unexpanded_env_vars};
use reqwest::Url;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })
}

/// Expand, parse and validate a YAML config document
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let yaml_string = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml_string)?;

    let config: Config = serde_yaml::from_str(&yaml_string)?;
    validate_config(&config)?;

    Ok(config)
}

/// Checks for unexpanded environment variables and returns a helpful error
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let unexpanded_vars = unexpanded_env_vars(yaml_string);

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    let error_msg = if unexpanded_vars.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with an actual value",
            unexpanded_vars[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variables\n\
             2. Replace the variables in the config file with actual values",
            unexpanded_vars.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    validate_log_store(&config.log_store, &mut errors);
    validate_transport(&config.transport, &mut errors);

    if config.tail.poll_interval.is_zero() {
        errors.push("tail.poll_interval must be greater than zero".to_string());
    }

    if config
        .history
        .clock_skewed_loggers
        .iter()
        .any(|logger| logger.trim().is_empty())
    {
        errors.push("history.clock_skewed_loggers must not contain empty names".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn validate_log_store(log_store: &LogStoreConfig, errors: &mut Vec<String>) {
    if log_store.uri.trim().is_empty() {
        errors.push("log_store.uri must not be empty".to_string());
        return;
    }

    match Url::parse(&log_store.uri) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(format!(
            "log_store.uri: unsupported scheme '{}', expected http or https",
            url.scheme()
        )),
        Err(e) => errors.push(format!("log_store.uri: invalid URL '{}': {}", log_store.uri, e)),
    }
}

fn validate_transport(transport: &TransportConfig, errors: &mut Vec<String>) {
    if transport.timeout.is_zero() {
        errors.push("transport.timeout must be greater than zero".to_string());
    }

    if let Some(name) = &transport.token_env {
        if name.trim().is_empty() {
            errors.push("transport.token_env must not be empty when set".to_string());
        }
    }

    let retry = &transport.retry;
    if retry.max_attempts == 0 {
        errors.push("transport.retry.max_attempts must be at least 1".to_string());
    }
    if retry.initial_backoff > retry.max_backoff {
        errors.push(format!(
            "transport.retry.initial_backoff ({:?}) exceeds max_backoff ({:?})",
            retry.initial_backoff, retry.max_backoff
        ));
    }
}
