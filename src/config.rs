use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::skins::resolver::{DEFAULT_TEXTURE_RETRY, LITTLE_SKIN_API};

const APP_DIR_NAME: &str = "kaizen-skins";
const CACHE_DIR: &str = "skins_cache";

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, overridden by `RUST_LOG`
    pub filter: String,
    /// Directory for daily log files; stderr only when unset
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,kaizen_skins_lib=debug".to_string(),
            log_dir: None,
        }
    }
}

/// Loader settings, stored as JSON. Missing fields take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoaderConfig {
    pub data_dir: PathBuf,
    /// Size of the bounded worker pool
    pub max_workers: usize,
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Pause between fetch attempts
    pub retry_delay_ms: u64,
    /// Attempts per texture download
    pub texture_retry: u32,
    pub little_skin_api: String,
    pub logging: LoggingConfig,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            user_agent: format!("KaizenLauncher/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            retry_delay_ms: 500,
            texture_retry: DEFAULT_TEXTURE_RETRY,
            little_skin_api: LITTLE_SKIN_API.to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl LoaderConfig {
    /// Read the config at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(AppError::Config(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        serde_json::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::Config(format!("Failed to create {}: {}", parent.display(), e)))?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)
            .map_err(|e| AppError::Config(format!("Failed to write {}: {}", path.display(), e)))
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join(CACHE_DIR)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Platform data directory, or the working directory when none exists
fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = LoaderConfig::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, LoaderConfig::default());
        assert_eq!(config.texture_retry, 3);
        assert_eq!(config.little_skin_api, "http://mcskin.littleservice.cn");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "max_workers": 2, "logging": { "log_dir": "/tmp/logs" } }"#).unwrap();

        let config = LoaderConfig::load(&path).unwrap();
        assert_eq!(config.max_workers, 2);
        assert_eq!(config.logging.log_dir, Some(PathBuf::from("/tmp/logs")));
        assert_eq!(config.logging.filter, LoggingConfig::default().filter);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ max_workers: ").unwrap();
        assert!(matches!(LoaderConfig::load(&path), Err(AppError::Config(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = LoaderConfig {
            data_dir: dir.path().to_path_buf(),
            retry_delay_ms: 0,
            ..LoaderConfig::default()
        };
        config.save(&path).unwrap();

        let loaded = LoaderConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.cache_dir(), dir.path().join("skins_cache"));
    }
}
