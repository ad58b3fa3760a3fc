use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_SESSION_PATH: &str = ".appspark/session.json";
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub backend: Option<BackendSection>,
    #[serde(default)]
    pub session: Option<SessionSection>,
    #[serde(default)]
    pub monitor: Option<MonitorSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendSection {
    /// Base URL of the AppsPark REST API (default: http://localhost:8000)
    pub base_url: Option<String>,
    /// Per-request timeout in seconds (default: 15)
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionSection {
    /// File holding the persisted `token` and `user` keys
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonitorSection {
    /// Interval between availability refreshes in watch mode (default: 30)
    pub refresh_interval_secs: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app: AppSection {
                name: "appspark".to_string(),
            },
            logging: LoggingSection {
                level: "info".to_string(),
            },
            backend: None,
            session: None,
            monitor: None,
        }
    }
}

impl Config {
    /// Returns the backend base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        let url = self
            .backend
            .as_ref()
            .and_then(|b| b.base_url.as_deref())
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(DEFAULT_BASE_URL);
        url.trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        let secs = self
            .backend
            .as_ref()
            .and_then(|b| b.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    pub fn session_path(&self) -> &Path {
        match self.session.as_ref().and_then(|s| s.path.as_deref()) {
            Some(path) if !path.as_os_str().is_empty() => path,
            _ => Path::new(DEFAULT_SESSION_PATH),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        let secs = self
            .monitor
            .as_ref()
            .and_then(|m| m.refresh_interval_secs)
            .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS)
            .max(1);
        Duration::from_secs(secs)
    }

    /// Parses `[logging].level`, falling back to INFO for unknown values.
    pub fn log_level(&self) -> tracing::Level {
        self.logging
            .level
            .parse::<tracing::Level>()
            .unwrap_or(tracing::Level::INFO)
    }
}
