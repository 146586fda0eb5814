//! Configuration loader
//!
//! Reads the `.env` file (if one was given) into the process environment,
//! builds a [`RelayServerConfig`] from the `OUTBOX_*` variables and
//! validates it. `dotenv` does not overwrite variables that are already set,
//! so the real environment wins over the file.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::dto::{CleanupSettings, DatabaseConfig, NatsConfig, RelayServerConfig, RelaySettings};
use super::error::{ConfigError, Result};
use super::validator::validate_server_config;

/// Configuration loader
///
/// ```ignore
/// let loader = ConfigLoader::new(Some(PathBuf::from(".env")));
/// let config = loader.load()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    env_file_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new(env_file_path: Option<PathBuf>) -> Self {
        Self { env_file_path }
    }

    /// Load and validate the relay configuration.
    pub fn load(&self) -> Result<RelayServerConfig> {
        if let Some(path) = &self.env_file_path {
            self.load_env_file(path)?;
        }

        let config = RelayServerConfig::from_env()?;
        validate_server_config(&config)?;

        Ok(config)
    }

    fn load_env_file(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(ConfigError::EnvFileLoad {
                path: path.to_path_buf(),
                source: dotenv::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path.display()),
                )),
            });
        }

        dotenv::from_path(path).map_err(|e| ConfigError::EnvFileLoad {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }
}

impl RelayServerConfig {
    /// Build from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source. `lookup` returns `None` for unset variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        Ok(Self {
            database: DatabaseConfig {
                url: vars.required("OUTBOX_DATABASE_URL")?,
                pool_size: vars.parse_or("OUTBOX_DB_POOL_SIZE", 5)?,
            },
            nats: NatsConfig {
                url: vars.required("OUTBOX_NATS_URL")?,
                subject_prefix: vars.string_or("OUTBOX_NATS_SUBJECT_PREFIX", "outbox"),
                stream: vars.string_or("OUTBOX_NATS_STREAM", "OUTBOX"),
                ack_timeout_ms: vars.parse_or("OUTBOX_NATS_ACK_TIMEOUT_MS", 5000)?,
            },
            relay: RelaySettings {
                lock_name: vars.string_or("OUTBOX_LOCK_NAME", "outbox-relay"),
                instance_id: vars
                    .optional("OUTBOX_INSTANCE_ID")
                    .unwrap_or_else(|| format!("relay-{}", uuid::Uuid::new_v4())),
                event_source: vars.optional("OUTBOX_EVENT_SOURCE"),
                poll_interval_ms: vars.parse_or("OUTBOX_POLL_INTERVAL_MS", 500)?,
                lease_timeout_ms: vars.parse_or("OUTBOX_LEASE_TIMEOUT_MS", 5000)?,
                batch_size: vars.parse_or("OUTBOX_BATCH_SIZE", 100)?,
                topics: vars
                    .optional("OUTBOX_TOPICS")
                    .map(|topics| parse_topics(&topics))
                    .unwrap_or_default(),
            },
            cleanup: CleanupSettings {
                enabled: vars.flag("OUTBOX_CLEANUP_ENABLED")?,
                interval_secs: vars.parse_or("OUTBOX_CLEANUP_INTERVAL_SECS", 3600)?,
                retention_secs: vars.parse_or("OUTBOX_CLEANUP_RETENTION_SECS", 7 * 24 * 3600)?,
            },
        })
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Set and non-blank, trimmed.
    fn optional(&self, var: &str) -> Option<String> {
        (self.lookup)(var)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, var: &str) -> Result<String> {
        self.optional(var).ok_or_else(|| ConfigError::MissingRequired {
            var: var.to_string(),
        })
    }

    fn string_or(&self, var: &str, default: &str) -> String {
        self.optional(var).unwrap_or_else(|| default.to_string())
    }

    /// Unset uses `default`; a value that does not parse is an error.
    fn parse_or<T: FromStr>(&self, var: &str, default: T) -> Result<T> {
        match self.optional(var) {
            None => Ok(default),
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    var: var.to_string(),
                    value,
                }),
        }
    }

    fn flag(&self, var: &str) -> Result<bool> {
        match self.optional(var).map(|v| v.to_ascii_lowercase()) {
            None => Ok(false),
            Some(value) => match value.as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidValue {
                    var: var.to_string(),
                    value,
                }),
            },
        }
    }
}

fn parse_topics(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|topic| !topic.is_empty())
        .map(str::to_string)
        .collect()
}
