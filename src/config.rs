//! Configuration for the dashboard.
//!
//! Loaded from a TOML file, then overridden by the environment and finally by
//! command-line arguments.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;

pub const API_URL_ENV: &str = "MARKET_INTEL_API_URL";
const APP_DIR: &str = "market-intel-tui";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub request_timeout: Duration,
    pub news_page_size: u32,
    pub search_debounce: Duration,
    pub banner_ttl: Duration,
    /// `None` disables live refresh entirely.
    pub live_refresh: Option<Duration>,
    pub default_range_days: u32,
    pub spike_ratio: f64,
    pub hot_list_limit: u32,
    pub trade_tape_limit: u32,
    pub forecast_horizon: u32,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from(TomlConfig::default())
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: TomlConfig = toml::from_str(content)?;
        Ok(Self::from(file))
    }

    /// Load `path`, or the default location when `None`. A missing file at
    /// the default location yields the defaults; an explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => {
                    debug!("no config file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    /// Apply the `MARKET_INTEL_API_URL` environment override.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.api_url = url.trim().to_string();
        }
    }

    /// Apply CLI overrides to the configuration.
    pub fn apply_overrides(&mut self, api_url: Option<String>) {
        if let Some(url) = api_url {
            self.api_url = url;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(self.api_url.clone()));
        }
        let counts = [
            ("news_page_size", self.news_page_size),
            ("default_range_days", self.default_range_days),
            ("hot_list_limit", self.hot_list_limit),
            ("trade_tape_limit", self.trade_tape_limit),
            ("forecast_horizon", self.forecast_horizon),
        ];
        if let Some(&(field, _)) = counts.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::ZeroValue { field });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroValue { field: "request_timeout_secs" });
        }
        if self.banner_ttl.is_zero() {
            return Err(ConfigError::ZeroValue { field: "banner_secs" });
        }
        if self.spike_ratio <= 0.0 {
            return Err(ConfigError::ZeroValue { field: "spike_ratio" });
        }
        Ok(())
    }
}

/// `~/.config/market-intel-tui/config.toml`
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}

/// Log file location; stdout is owned by the terminal UI.
pub fn log_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
        .join("market-intel-tui.log")
}

impl From<TomlConfig> for Config {
    fn from(file: TomlConfig) -> Self {
        Self {
            api_url: file.api.url,
            request_timeout: Duration::from_secs(file.api.request_timeout_secs),
            news_page_size: file.ui.news_page_size,
            search_debounce: Duration::from_millis(file.ui.search_debounce_ms),
            banner_ttl: Duration::from_secs(file.ui.banner_secs),
            live_refresh: (file.ui.live_refresh_secs > 0).then(|| Duration::from_secs(file.ui.live_refresh_secs)),
            default_range_days: file.ui.default_range_days,
            spike_ratio: file.data.spike_ratio,
            hot_list_limit: file.data.hot_list_limit,
            trade_tape_limit: file.data.trade_tape_limit,
            forecast_horizon: file.data.forecast_horizon,
            log_level: file.general.log_level,
        }
    }
}

/// TOML file structure for deserialization.
#[derive(Debug, Default, Deserialize)]
struct TomlConfig {
    #[serde(default)]
    general: GeneralToml,
    #[serde(default)]
    api: ApiToml,
    #[serde(default)]
    ui: UiToml,
    #[serde(default)]
    data: DataToml,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct GeneralToml {
    log_level: String,
}

impl Default for GeneralToml {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ApiToml {
    url: String,
    request_timeout_secs: u64,
}

impl Default for ApiToml {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct UiToml {
    news_page_size: u32,
    search_debounce_ms: u64,
    banner_secs: u64,
    live_refresh_secs: u64,
    default_range_days: u32,
}

impl Default for UiToml {
    fn default() -> Self {
        Self {
            news_page_size: 20,
            search_debounce_ms: 400,
            banner_secs: 4,
            live_refresh_secs: 15,
            default_range_days: 90,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct DataToml {
    spike_ratio: f64,
    hot_list_limit: u32,
    trade_tape_limit: u32,
    forecast_horizon: u32,
}

impl Default for DataToml {
    fn default() -> Self {
        Self {
            spike_ratio: 2.0,
            hot_list_limit: 30,
            trade_tape_limit: 100,
            forecast_horizon: 14,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.search_debounce, Duration::from_millis(400));
        assert_eq!(config.banner_ttl, Duration::from_secs(4));
        assert_eq!(config.live_refresh, Some(Duration::from_secs(15)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [api]
            url = "https://intel.example.com"

            [ui]
            news_page_size = 50
            live_refresh_secs = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.api_url, "https://intel.example.com");
        assert_eq!(config.news_page_size, 50);
        assert_eq!(config.live_refresh, None);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.spike_ratio, 2.0);
    }

    #[test]
    fn reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[general]\nlog_level = \"debug\"\n[data]\nforecast_horizon = 30").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.forecast_horizon, 30);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = Config::from_toml_str("[api\nurl = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn env_then_cli_override() {
        let mut config = Config::default();
        config.apply_env_from(|key| (key == API_URL_ENV).then(|| "http://env:9000".to_string()));
        assert_eq!(config.api_url, "http://env:9000");
        config.apply_overrides(Some("http://cli:7000".into()));
        assert_eq!(config.api_url, "http://cli:7000");

        config.apply_env_from(|_| Some("   ".into()));
        assert_eq!(config.api_url, "http://cli:7000");
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = Config::default();
        config.api_url = "localhost:8000".into();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(_))));

        let mut config = Config::default();
        config.news_page_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroValue { field: "news_page_size" })
        ));
    }

    #[test]
    fn zero_banner_lifetime_is_rejected() {
        let mut config = Config::default();
        config.banner_ttl = Duration::ZERO;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroValue { field: "banner_secs" })
        ));
    }
}
