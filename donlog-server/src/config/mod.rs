//! Configuration module for donlog-server.
//!
//! Handles loading configuration from the TOML file, CLI arguments, and
//! environment variables.

pub mod file;

pub use file::{EngineConfig, FileConfig, ServerConfig, SinkConfig};

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Loads the configuration file and applies CLI overrides.
pub struct ConfigLoader {
    path: PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    pub fn new(path: &Path, listen_override: Option<SocketAddr>) -> Self {
        Self {
            path: path.to_path_buf(),
            listen_override,
        }
    }

    /// Read and parse the config file, applying any CLI overrides.
    pub fn load(&self) -> Result<FileConfig, ConfigError> {
        let raw = std::fs::read_to_string(&self.path)?;
        let mut config: FileConfig = toml::from_str(&raw)?;
        if let Some(listen) = self.listen_override {
            config.server.listen = listen;
        }
        Ok(config)
    }
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}
