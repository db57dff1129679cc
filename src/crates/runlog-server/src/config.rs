//! Server configuration
//!
//! Values come from an optional TOML file; command-line flags override
//! whatever the file sets.
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 9000
//! projects_dir = "/data/runlog/projects"
//! ```

use runlog::Settings;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default bind host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default bind port
pub const DEFAULT_PORT: u16 = 8765;

#[derive(Debug, Error)]
pub enum ServerConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Complete server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    /// Port to bind
    pub port: u16,

    /// Directory holding one subdirectory per project. Falls back to
    /// `<home>/projects` when unset.
    pub projects_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            projects_dir: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ServerConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ServerConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ServerConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply command-line overrides; `None` keeps the current value
    pub fn with_overrides(
        mut self,
        host: Option<String>,
        port: Option<u16>,
        projects_dir: Option<PathBuf>,
    ) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        if projects_dir.is_some() {
            self.projects_dir = projects_dir;
        }
        self
    }

    /// Projects directory to serve
    pub fn resolve_projects_dir(&self, settings: &Settings) -> PathBuf {
        self.projects_dir
            .clone()
            .unwrap_or_else(|| settings.projects_dir())
    }

    /// Address to bind
    pub fn socket_addr(&self) -> Result<SocketAddr, ServerConfigError> {
        let host = if self.host == "localhost" {
            DEFAULT_HOST
        } else {
            self.host.as_str()
        };
        format!("{}:{}", host, self.port)
            .parse()
            .map_err(|e| ServerConfigError::InvalidConfig(format!("bad address '{}:{}': {}", self.host, self.port, e)))
    }
}
