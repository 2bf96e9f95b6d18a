use crate::common::constants::*;
use crate::common::error::{DiggerError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Runtime configuration, injected into each component at construction.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub matching: MatchingConfig,
    pub pricing: PricingConfig,
    pub proxy: ProxyConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub api_base: String,
    pub web_base: String,
    pub token: Option<String>,
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub per_page: u32,
    pub max_pages: u32,
    pub requests_per_min: u64,
    /// Cap on in-flight API requests; unset means no cap.
    pub max_concurrency: Option<u32>,
    /// Path template for marketplace listings; `{release_id}` is substituted.
    pub listings_path: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_CATALOG_API_BASE.to_string(),
            web_base: DEFAULT_CATALOG_WEB_BASE.to_string(),
            token: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_seconds: 15,
            per_page: 10,
            max_pages: 1,
            requests_per_min: 60,
            max_concurrency: None,
            listings_path: "/marketplace/listings/release/{release_id}".to_string(),
        }
    }
}

impl CatalogConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }

    pub fn release_url(&self, release_id: u64) -> String {
        format!("{}/release/{}", self.web_base.trim_end_matches('/'), release_id)
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub acceptance_threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub freshness_window_hours: i64,
    /// Applied to the API lowest price to approximate what a seller nets.
    pub api_net_multiplier: f64,
    pub statistics_window_chars: usize,
    pub batch_delay_ms: u64,
    pub max_batch_size: usize,
    pub listings_per_page: u32,
    pub max_listing_pages: u32,
    pub include_shipping: bool,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            freshness_window_hours: DEFAULT_FRESHNESS_WINDOW_HOURS,
            api_net_multiplier: DEFAULT_API_NET_MULTIPLIER,
            statistics_window_chars: DEFAULT_STATISTICS_WINDOW_CHARS,
            batch_delay_ms: DEFAULT_BATCH_DELAY_MS,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            listings_per_page: 100,
            max_listing_pages: 5,
            include_shipping: false,
        }
    }
}

impl PricingConfig {
    pub fn freshness_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.freshness_window_hours)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub api_key: Option<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "https://api.scraperapi.com/".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "data/prices.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: String,
    pub file_name: String,
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: "logs".to_string(),
            file_name: "crate_digger.log".to_string(),
            default_filter: "crate_digger=info".to_string(),
        }
    }
}

impl Config {
    /// Reads `CRATE_DIGGER_CONFIG` (or `config.toml`) when present, then applies
    /// environment overrides. A missing file means defaults.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let config_path =
            std::env::var("CRATE_DIGGER_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        let mut config = if Path::new(&config_path).exists() {
            Self::load_from(&config_path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_content = fs::read_to_string(path).map_err(|e| {
            DiggerError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&config_content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Secrets and paths may come from the environment instead of the file.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("CATALOG_TOKEN").filter(|v| !v.is_empty()) {
            self.catalog.token = Some(token);
        }
        if let Some(key) = lookup("SCRAPER_PROXY_API_KEY").filter(|v| !v.is_empty()) {
            self.proxy.api_key = Some(key);
            self.proxy.enabled = true;
        }
        if let Some(db_path) = lookup("CRATE_DIGGER_DB").filter(|v| !v.is_empty()) {
            self.storage.db_path = db_path;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.pricing.api_net_multiplier) {
            return Err(DiggerError::Config(format!(
                "pricing.api_net_multiplier must be within 0..=1, got {}",
                self.pricing.api_net_multiplier
            )));
        }
        if self.pricing.freshness_window_hours < 0 {
            return Err(DiggerError::Config(
                "pricing.freshness_window_hours must not be negative".to_string(),
            ));
        }
        if self.proxy.enabled && self.proxy.api_key.is_none() {
            return Err(DiggerError::Config(
                "proxy.enabled requires proxy.api_key (or SCRAPER_PROXY_API_KEY)".to_string(),
            ));
        }
        Ok(())
    }
}
