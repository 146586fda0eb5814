//! Configuration validation

use super::dto::RelayServerConfig;
use super::error::{ConfigError, Result};

/// Validate the whole relay configuration.
pub fn validate_server_config(config: &RelayServerConfig) -> Result<()> {
    validate_database_url(&config.database.url)?;
    validate_nats_url(&config.nats.url)?;

    if config.database.pool_size < 2 {
        return Err(ConfigError::Validation(format!(
            "OUTBOX_DB_POOL_SIZE must be at least 2 (lease hold plus record updates), got: {}",
            config.database.pool_size
        )));
    }

    if config.nats.subject_prefix.is_empty() {
        return Err(ConfigError::Validation(
            "OUTBOX_NATS_SUBJECT_PREFIX cannot be empty".to_string(),
        ));
    }

    if config.nats.ack_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "OUTBOX_NATS_ACK_TIMEOUT_MS must be greater than 0".to_string(),
        ));
    }

    if config.cleanup.enabled && config.cleanup.interval_secs == 0 {
        return Err(ConfigError::Validation(
            "OUTBOX_CLEANUP_INTERVAL_SECS must be greater than 0".to_string(),
        ));
    }

    config
        .relay_config()
        .validate()
        .map_err(|e| ConfigError::Validation(e.to_string()))
}

/// Validate a database URL format
pub fn validate_database_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(ConfigError::InvalidDatabaseUrl(
            "Database URL cannot be empty".to_string(),
        ));
    }

    if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
        return Err(ConfigError::InvalidDatabaseUrl(format!(
            "Database URL must start with postgres:// or postgresql://, got: {}",
            url
        )));
    }

    Ok(())
}

/// Validate a NATS server URL
pub fn validate_nats_url(url: &str) -> Result<()> {
    let valid = ["nats://", "tls://", "ws://", "wss://"]
        .iter()
        .any(|scheme| url.starts_with(scheme) && url.len() > scheme.len());

    if !valid {
        return Err(ConfigError::InvalidUrl(format!(
            "NATS URL must start with nats://, tls://, ws:// or wss://, got: {}",
            url
        )));
    }

    Ok(())
}
