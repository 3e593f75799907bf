use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use swiftpay_core::rust_decimal::Decimal;
use swiftpay_core::{AmountPolicy, VoiceConfig};

pub const CONFIG_FILE: &str = "swiftpay_config.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid maxAmount {0:?}")]
    InvalidMaxAmount(String),
}

/// Tunables persisted next to the app's data. Missing keys take defaults so
/// older files keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub device_timeout_ms: u64,
    pub max_amount: String,
    pub speech_locale: String,
    pub signup_redirect_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device_timeout_ms: 30_000,
            max_amount: "100000".to_string(),
            speech_locale: "en-US".to_string(),
            signup_redirect_ms: 1_500,
        }
    }
}

impl AppConfig {
    /// Read the config from `dir`, writing the defaults there on first launch.
    pub fn load_or_init(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            let config = Self::default();
            config.save(dir)?;
            log::info!("wrote default config to {}", path.display());
            return Ok(config);
        }
        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config: Self = serde_json::from_str(&contents)?;
        config.amount_policy()?;
        Ok(config)
    }

    pub fn save(&self, dir: &Path) -> Result<(), ConfigError> {
        let path = dir.join(CONFIG_FILE);
        fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).map_err(|source| ConfigError::Io { path, source })
    }

    pub fn device_timeout(&self) -> Duration {
        Duration::from_millis(self.device_timeout_ms)
    }

    pub fn signup_redirect(&self) -> Duration {
        Duration::from_millis(self.signup_redirect_ms)
    }

    pub fn amount_policy(&self) -> Result<AmountPolicy, ConfigError> {
        let max = Decimal::from_str(self.max_amount.trim())
            .ok()
            .filter(|m| *m > Decimal::ZERO)
            .ok_or_else(|| ConfigError::InvalidMaxAmount(self.max_amount.clone()))?;
        Ok(AmountPolicy { max })
    }

    pub fn voice(&self) -> VoiceConfig {
        VoiceConfig {
            locale: self.speech_locale.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_launch_writes_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("app-data");
        let config = AppConfig::load_or_init(&dir).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(dir.join(CONFIG_FILE).exists());

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join(CONFIG_FILE)).unwrap()).unwrap();
        assert_eq!(raw["deviceTimeoutMs"], 30_000);
        assert_eq!(raw["speechLocale"], "en-US");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), r#"{"maxAmount":"500"}"#).unwrap();

        let config = AppConfig::load_or_init(tmp.path()).unwrap();
        assert_eq!(config.max_amount, "500");
        assert_eq!(config.signup_redirect(), Duration::from_millis(1500));
        assert_eq!(config.amount_policy().unwrap().max, Decimal::new(500, 0));
    }

    #[test]
    fn rejects_bad_max_amount() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), r#"{"maxAmount":"lots"}"#).unwrap();
        assert!(matches!(
            AppConfig::load_or_init(tmp.path()),
            Err(ConfigError::InvalidMaxAmount(_))
        ));
    }

    #[test]
    fn rejects_malformed_json() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "{").unwrap();
        assert!(matches!(
            AppConfig::load_or_init(tmp.path()),
            Err(ConfigError::Json(_))
        ));
    }
}
