//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{HandwireConfig, LogOutput, LoggingConfig};
use handwire_core::ChainConfig;

/// Validates the entire configuration.
pub fn validate_config(config: &HandwireConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_chain_config(&config.chain)?;
    Ok(())
}

fn validate_logging_config(config: &LoggingConfig) -> ConfigResult<()> {
    if config.output == LogOutput::File && config.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when logging.output is \"file\"",
        ));
    }

    if config.max_files == 0 {
        return Err(ConfigError::validation(
            "logging.max_files must be greater than 0",
        ));
    }

    if let Some(module) = config.filters.keys().find(|m| m.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Invalid logging filter module: {module:?}"
        )));
    }

    Ok(())
}

fn validate_chain_config(config: &ChainConfig) -> ConfigResult<()> {
    if config.history_capacity == 0 {
        return Err(ConfigError::validation(
            "chain.history_capacity must be greater than 0",
        ));
    }
    Ok(())
}
