use crate::core::currency::{CurrencyCode, RateRecord};
use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_RATES_URL: &str = "https://www.x-rates.com/table/?from=USD&amount=1";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/99.0.4844.51 Safari/537.36";
pub const DEFAULT_TRACE_ID: &str = "Root=1-6228d3e0-1613b48566e186fd4764b5f9";
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    pub url: String,
    pub user_agent: String,
    /// Extra static request headers, sent verbatim.
    pub headers: BTreeMap<String, String>,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            url: DEFAULT_RATES_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: BTreeMap::from([("X-Amzn-Trace-Id".to_string(), DEFAULT_TRACE_ID.to_string())]),
            timeout_secs: 10,
        }
    }
}

/// The reference currency every scraped rate is quoted against.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BaseCurrencyConfig {
    pub code: CurrencyCode,
    pub name: String,
}

impl BaseCurrencyConfig {
    pub fn record(&self) -> RateRecord {
        RateRecord::base(self.name.clone(), self.code.clone())
    }
}

impl Default for BaseCurrencyConfig {
    fn default() -> Self {
        BaseCurrencyConfig {
            code: CurrencyCode::from_static("USD"),
            name: "US Dollar".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub base: BaseCurrencyConfig,
    pub refresh_interval_secs: u64,
    /// Extra attempts for the initial load before startup gives up.
    pub startup_retries: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            source: SourceConfig::default(),
            base: BaseCurrencyConfig::default(),
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            startup_retries: 2,
        }
    }
}

impl AppConfig {
    /// Loads the default config file, falling back to built-in defaults when it does not exist.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(path = %config_path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "worldcoins", "worldcoins")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_secs == 0 {
            bail!("refresh_interval_secs must be greater than zero");
        }
        if self.source.timeout_secs == 0 {
            bail!("source.timeout_secs must be greater than zero");
        }
        reqwest::Url::parse(&self.source.url)
            .with_context(|| format!("Invalid source url: {}", self.source.url))?;
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}
