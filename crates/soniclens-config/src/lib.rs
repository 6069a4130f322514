use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding [`CaptionConfig::endpoint`].
pub const ENV_ENDPOINT: &str = "SONICLENS_ENDPOINT";
/// Environment variable overriding [`CaptionConfig::interval_ms`].
pub const ENV_INTERVAL_MS: &str = "SONICLENS_INTERVAL_MS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON5 parse error: {0}")]
    Json5(#[from] json5::Error),
    #[error("Config directory not found")]
    NoDirFound,
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Caption polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionConfig {
    /// Full URL of the latest-caption endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Poll interval in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Upper bound on a single request round trip, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_endpoint() -> String {
    "http://localhost:8000/latest_caption".to_string()
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_request_timeout_ms() -> u64 {
    5000
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            interval_ms: default_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl CaptionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Camera configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Whether to request a capture stream at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Index of the capture device to open.
    #[serde(default)]
    pub device_index: u32,
}

fn default_true() -> bool {
    true
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            device_index: 0,
        }
    }
}

/// Top-level soniclens configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SonicLensConfig {
    #[serde(default)]
    pub caption: CaptionConfig,
    #[serde(default)]
    pub camera: CameraConfig,
}

impl SonicLensConfig {
    /// Apply overrides from a variable lookup (normally `std::env::var`).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            self.caption.endpoint = endpoint;
        }
        if let Some(raw) = lookup(ENV_INTERVAL_MS) {
            self.caption.interval_ms = raw.trim().parse().map_err(|e| ConfigError::Invalid {
                key: ENV_INTERVAL_MS,
                reason: format!("{raw:?}: {e}"),
            })?;
        }
        Ok(())
    }

    /// Check values that serde alone cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = url::Url::parse(&self.caption.endpoint).map_err(|e| ConfigError::Invalid {
            key: "caption.endpoint",
            reason: e.to_string(),
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                key: "caption.endpoint",
                reason: format!("unsupported scheme {}", endpoint.scheme()),
            });
        }
        if self.caption.interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "caption.interval_ms",
                reason: "must be greater than zero".into(),
            });
        }
        if self.caption.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "caption.request_timeout_ms",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

/// Resolve the soniclens config directory (~/.soniclens/).
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|h| h.join(".soniclens"))
        .ok_or(ConfigError::NoDirFound)
}

/// Resolve the config file path (~/.soniclens/config.json5).
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.json5"))
}

/// Load configuration from the default path and the environment.
pub fn load_config() -> Result<SonicLensConfig, ConfigError> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let path = config_file_path()?;
    let mut config = load_config_from(&path)?;
    config.apply_overrides(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a specific path, falling back to defaults if not found.
pub fn load_config_from(path: &Path) -> Result<SonicLensConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("Config file not found at {}, using defaults", path.display());
        return Ok(SonicLensConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: SonicLensConfig = json5::from_str(&content)?;
    Ok(config)
}
