//! Client configuration, loaded from TOML with command-line overrides.
//!
//! ```toml
//! user = "alice"
//!
//! [server]
//! base_url = "http://localhost:8080"
//! connect_timeout_ms = 10000
//! request_timeout_ms = 30000
//!
//! [refresh]
//! interval_ms = 1000
//! ```

use crate::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub base_url: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RefreshConfig {
    pub interval_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Opaque user identifier sent with every request.
    pub user: Option<String>,
    pub server: ServerConfig,
    pub refresh: RefreshConfig,
}

impl ClientConfig {
    /// `<config dir>/emulator-client/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("emulator-client").join("config.toml"))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or from [`default_path`](Self::default_path) when
    /// none is given. A missing default file yields the defaults; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                debug!("Loaded configuration from {}", path.display());
                Self::from_toml_str(&contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => Ok(Self::default()),
            Err(e) => Err(ClientError::Config(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Apply command-line / environment overrides.
    pub fn with_overrides(mut self, base_url: Option<String>, user: Option<String>) -> Self {
        if let Some(url) = base_url {
            self.server.base_url = url;
        }
        if user.is_some() {
            self.user = user;
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if self.server.base_url.trim().is_empty() {
            return Err(ClientError::Config("server.base_url must not be empty".into()));
        }
        if self.refresh.interval_ms == 0 {
            return Err(ClientError::Config(
                "refresh.interval_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
