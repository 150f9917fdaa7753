//! Configuration management for raspberry
//!
//! This module handles loading and validating configuration from environment variables
//! and TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::utils::retry::RetryConfig;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Relational store configuration
    pub database: DatabaseConfig,

    /// Counter and mirror file configuration
    pub storage: StorageConfig,

    /// Schema bootstrap retry configuration
    pub bootstrap: BootstrapConfig,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

/// File-backed stores configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Counter file holding the highest identifier ever issued
    pub counter_path: PathBuf,

    /// Indentation width used when writing the counter file
    pub counter_indent: usize,

    /// Writable mirror file
    pub mirror_path: PathBuf,

    /// Bundled read-only mirror used to seed the writable copy
    #[serde(default)]
    pub mirror_seed_path: Option<PathBuf>,

    /// Field delimiter of the mirror file
    pub delimiter: String,

    /// Literal written for winning records
    pub winner_literal: String,
}

/// Schema bootstrap configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Maximum number of probes before giving up
    pub max_attempts: u32,

    /// First delay between probes in milliseconds
    pub base_delay_ms: u64,

    /// Upper bound for the delay in milliseconds
    pub max_delay_ms: u64,
}

impl BootstrapConfig {
    /// Backoff policy used by the schema bootstrapper
    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::with_delays(self.max_attempts, self.base_delay_ms, self.max_delay_ms)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Allow cross-origin requests
    pub enable_cors: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let sqlite_path = env_or("RASPBERRY_SQLITE_PATH", defaults.database.sqlite_path);

        let counter_path = env_or("RASPBERRY_COUNTER_PATH", defaults.storage.counter_path);

        let counter_indent = std::env::var("RASPBERRY_COUNTER_INDENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.storage.counter_indent);

        let mirror_path = env_or("RASPBERRY_MIRROR_PATH", defaults.storage.mirror_path);

        let mirror_seed_path = std::env::var("RASPBERRY_MIRROR_SEED_PATH")
            .ok()
            .map(PathBuf::from)
            .or(defaults.storage.mirror_seed_path);

        let delimiter =
            std::env::var("RASPBERRY_MIRROR_DELIMITER").unwrap_or(defaults.storage.delimiter);

        let winner_literal =
            std::env::var("RASPBERRY_WINNER_LITERAL").unwrap_or(defaults.storage.winner_literal);

        let max_attempts = std::env::var("RASPBERRY_BOOTSTRAP_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.bootstrap.max_attempts);

        let host = std::env::var("RASPBERRY_HOST").unwrap_or(defaults.server.host);

        let port = std::env::var("RASPBERRY_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(defaults.server.port);

        let log_level = std::env::var("RASPBERRY_LOG_LEVEL").unwrap_or(defaults.logging.level);

        let log_format = std::env::var("RASPBERRY_LOG_FORMAT").unwrap_or(defaults.logging.format);

        let config = Self {
            database: DatabaseConfig { sqlite_path },
            storage: StorageConfig {
                counter_path,
                counter_indent,
                mirror_path,
                mirror_seed_path,
                delimiter,
                winner_literal,
            },
            bootstrap: BootstrapConfig {
                max_attempts,
                ..defaults.bootstrap
            },
            server: ServerConfig {
                host,
                port,
                enable_cors: defaults.server.enable_cors,
            },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let delimiter = &self.storage.delimiter;
        if delimiter.is_empty() {
            anyhow::bail!("storage.delimiter must not be empty");
        }

        if delimiter.contains('\n') || delimiter.contains('\r') {
            anyhow::bail!("storage.delimiter must not contain line breaks");
        }

        if self.storage.winner_literal.trim().is_empty() {
            anyhow::bail!("storage.winner_literal must not be blank");
        }

        if self.storage.winner_literal.contains(delimiter.as_str()) {
            anyhow::bail!("storage.winner_literal must not contain the delimiter");
        }

        if self.bootstrap.max_attempts == 0 {
            anyhow::bail!("bootstrap.max_attempts must be greater than 0");
        }

        if self.bootstrap.base_delay_ms > self.bootstrap.max_delay_ms {
            anyhow::bail!("bootstrap.base_delay_ms must not exceed bootstrap.max_delay_ms");
        }

        if self.server.port == 0 {
            anyhow::bail!("server.port must be greater than 0");
        }

        Ok(())
    }

    /// Address the HTTP server binds to
    #[must_use]
    pub fn bind_address(&self) -> String {
        self.server.bind_address()
    }
}

impl ServerConfig {
    /// `host:port` string accepted by `TcpListener::bind`
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_or(key: &str, default: PathBuf) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                sqlite_path: PathBuf::from("data/movies.db"),
            },
            storage: StorageConfig {
                counter_path: PathBuf::from("data/counter.xml"),
                counter_indent: 4,
                mirror_path: PathBuf::from("data/movielist.csv"),
                mirror_seed_path: Some(PathBuf::from("assets/movielist.csv")),
                delimiter: String::from(";"),
                winner_literal: String::from("yes"),
            },
            bootstrap: BootstrapConfig {
                max_attempts: 5,
                base_delay_ms: 200,
                max_delay_ms: 5_000,
            },
            server: ServerConfig {
                host: String::from("127.0.0.1"),
                port: 8080,
                enable_cors: true,
            },
            logging: LoggingConfig {
                level: String::from("info"),
                format: String::from("text"),
            },
        }
    }
}
