//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from a TOML file without validating it.
pub fn read_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load, apply environment overrides to, and validate a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let mut config = read_config(path)?;
    finalize(&mut config)?;
    Ok(config)
}

/// Apply environment overrides and validate an in-memory configuration.
pub fn finalize(config: &mut GatewayConfig) -> Result<(), ConfigError> {
    let mut errors = Vec::new();
    if let Err(e) = apply_env_overrides(config) {
        errors.push(e);
    }
    if let Err(mut found) = validate_config(config) {
        errors.append(&mut found);
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation(errors))
    }
}

/// Apply `PORT` and `SHARED_STORE_URL` from the process environment.
pub fn apply_env_overrides(config: &mut GatewayConfig) -> Result<(), ValidationError> {
    apply_overrides(config, |key| std::env::var(key).ok())
}

/// Apply overrides from an arbitrary variable lookup.
pub fn apply_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ValidationError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("SHARED_STORE_URL").filter(|v| !v.is_empty()) {
        config.shared_store.url = url;
    }

    if let Some(port) = lookup("PORT").filter(|v| !v.is_empty()) {
        let port: u16 = port
            .trim()
            .parse()
            .map_err(|_| ValidationError::InvalidPort(port.clone()))?;
        config.listener.bind_address = format!("0.0.0.0:{}", port);
    }

    Ok(())
}
