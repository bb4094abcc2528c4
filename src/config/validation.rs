use crate::config::types::{ClientConfig, Config, ProxyConfig, StorageConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_client_config(&config.client)?;
    validate_proxy_config(&config.proxy)?;
    validate_storage_config(&config.storage)?;
    Ok(())
}

/// Validates HTTP client configuration
///
/// Any timeout value is accepted: non-positive values mean "no timeout".
fn validate_client_config(config: &ClientConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.user_agent.chars().any(|c| c.is_control()) {
        return Err(ConfigError::Validation(format!(
            "user-agent contains control characters: {:?}",
            config.user_agent
        )));
    }

    Ok(())
}

/// Validates proxy configuration
///
/// A disabled proxy is never checked, so a half-filled section can be kept
/// around and toggled later.
fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    if !config.enabled {
        return Ok(());
    }

    if config.uri.is_empty() {
        return Err(ConfigError::Validation(
            "proxy uri cannot be empty when the proxy is enabled".to_string(),
        ));
    }

    let url = Url::parse(&config.uri)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy uri '{}': {}", config.uri, e)))?;

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "Proxy uri '{}' has no host",
            config.uri
        )));
    }

    if config.username.is_empty() && !config.password.is_empty() {
        return Err(ConfigError::Validation(
            "proxy password given without a proxy username".to_string(),
        ));
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
