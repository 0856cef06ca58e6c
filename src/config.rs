use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub access: AccessConfig,

    pub rate_limit: RateLimitConfig,

    pub access_window: AccessWindowConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Event bus buffer size (default: 100)
    pub event_bus_buffer_size: usize,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/missive.db".to_string(),
            log_level: "info".to_string(),
            event_bus_buffer_size: 100,
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8000,
            cors_allowed_origins: vec![
                "http://localhost:8000".to_string(),
                "http://127.0.0.1:8000".to_string(),
            ],
        }
    }
}

/// Settings for the guarded access chain (connection, retry, transaction).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Logical name of the database, used in logs and errors.
    pub database_name: String,

    /// URL the connection provider opens. Empty means `general.database_path`.
    pub database_url: String,

    /// Maximum attempts per operation, including the first one.
    pub retry_attempts: u32,

    pub retry_delay_ms: u64,

    /// Age threshold used by the concurrent user summary.
    pub older_than_age: i32,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            database_name: "users".to_string(),
            database_url: String::new(),
            retry_attempts: 3,
            retry_delay_ms: 2000,
            older_than_age: 40,
        }
    }
}

impl AccessConfig {
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,

    /// Write requests allowed per client inside the window.
    pub max_requests: usize,

    pub window_seconds: u64,

    /// Use the first `X-Forwarded-For` entry as client identity.
    /// Only enable behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 5,
            window_seconds: 60,
            trust_forwarded_for: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessWindowConfig {
    pub enabled: bool,

    /// Opening time, "HH:MM" local time (inclusive).
    pub start: String,

    /// Closing time, "HH:MM" local time (exclusive).
    pub end: String,
}

impl Default for AccessWindowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            start: "06:00".to_string(),
            end: "21:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    /// Append-only request log; empty disables the file.
    pub request_log_path: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            request_log_path: "requests.log".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            access: AccessConfig::default(),
            rate_limit: RateLimitConfig::default(),
            access_window: AccessWindowConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("missive").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".missive").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.event_bus_buffer_size == 0 {
            anyhow::bail!("general.event_bus_buffer_size must be at least 1");
        }

        if self.access.retry_attempts == 0 {
            anyhow::bail!("access.retry_attempts must be at least 1");
        }

        if self.rate_limit.enabled
            && (self.rate_limit.max_requests == 0 || self.rate_limit.window_seconds == 0)
        {
            anyhow::bail!("rate_limit.max_requests and window_seconds must be > 0 when enabled");
        }

        if self.access_window.enabled {
            crate::gate::AccessWindow::parse(&self.access_window.start, &self.access_window.end)?;
        }

        Ok(())
    }

    /// URL the access chain connects to.
    #[must_use]
    pub fn access_database_url(&self) -> &str {
        if self.access.database_url.is_empty() {
            &self.general.database_path
        } else {
            &self.access.database_url
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.rate_limit.window_seconds, 60);
        assert_eq!(config.access.retry_attempts, 3);
        assert_eq!(config.access_window.start, "06:00");
        assert_eq!(config.access_window.end, "21:00");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_event_bus_buffer_rejected() {
        let mut config = Config::default();
        config.general.event_bus_buffer_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[rate_limit]"));
        assert!(toml_str.contains("[access_window]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [rate_limit]
            max_requests = 10
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.rate_limit.max_requests, 10);

        assert_eq!(config.rate_limit.window_seconds, 60);
    }

    #[test]
    fn test_access_url_falls_back_to_database_path() {
        let mut config = Config::default();
        assert_eq!(config.access_database_url(), "sqlite:data/missive.db");

        config.access.database_url = "sqlite:other.db".to_string();
        assert_eq!(config.access_database_url(), "sqlite:other.db");
    }

    #[test]
    fn test_validate_rejects_bad_window() {
        let mut config = Config::default();
        config.access_window.start = "25:00".to_string();
        assert!(config.validate().is_err());
    }
}
