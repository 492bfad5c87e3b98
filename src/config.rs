//! Service configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::ConfigError;

/// Name of the JSON history log inside the data directory.
const HISTORY_FILE: &str = "history.json";

/// Service configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root data directory (history log lives here).
    pub data_dir: PathBuf,
    /// Directory for generated image files.
    pub images_dir: PathBuf,
    /// Directory for rolling log files, if file logging is enabled.
    pub logs_dir: Option<PathBuf>,
    /// Socket address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Allowed CORS origins ("*" entries allow any origin).
    pub cors_origins: Vec<String>,
    /// Maximum number of results retained in history.
    pub max_history_images: usize,
    /// Maximum age in days of results retained in history.
    pub max_history_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            images_dir: PathBuf::from("./data/images"),
            logs_dir: None,
            bind_addr: "0.0.0.0:8000".parse().expect("static addr"),
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
            ],
            max_history_images: 500,
            max_history_days: 30,
        }
    }
}

impl Config {
    /// Build a configuration from `ATELIER_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("ATELIER_DATA_DIR") {
            config.data_dir = PathBuf::from(&dir);
            config.images_dir = config.data_dir.join("images");
        }
        if let Ok(dir) = std::env::var("ATELIER_LOG_DIR") {
            config.logs_dir = Some(PathBuf::from(dir));
        }
        if let Ok(addr) = std::env::var("ATELIER_BIND") {
            config.bind_addr = addr.parse().map_err(|_| ConfigError::InvalidValue {
                key: "ATELIER_BIND".to_string(),
                message: format!("not a socket address: {addr}"),
            })?;
        }
        if let Ok(origins) = std::env::var("ATELIER_CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(max) = std::env::var("ATELIER_MAX_HISTORY_IMAGES") {
            config.max_history_images =
                max.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "ATELIER_MAX_HISTORY_IMAGES".to_string(),
                    message: format!("not a count: {max}"),
                })?;
        }
        if let Ok(days) = std::env::var("ATELIER_MAX_HISTORY_DAYS") {
            config.max_history_days =
                days.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "ATELIER_MAX_HISTORY_DAYS".to_string(),
                    message: format!("not a day count: {days}"),
                })?;
        }

        Ok(config)
    }

    /// Path of the JSON history log.
    pub fn history_file(&self) -> PathBuf {
        self.data_dir.join(HISTORY_FILE)
    }

    /// Create the data, image and log directories if missing.
    pub fn ensure_dirs(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.images_dir)?;
        if let Some(ref logs) = self.logs_dir {
            std::fs::create_dir_all(logs)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.max_history_images, 500);
        assert_eq!(config.max_history_days, 30);
        assert_eq!(config.history_file(), PathBuf::from("./data/history.json"));
    }

    #[test]
    fn ensure_dirs_creates_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: tmp.path().join("data"),
            images_dir: tmp.path().join("data/images"),
            logs_dir: Some(tmp.path().join("logs")),
            ..Config::default()
        };
        config.ensure_dirs().unwrap();
        assert!(config.images_dir.is_dir());
        assert!(tmp.path().join("logs").is_dir());
    }
}
