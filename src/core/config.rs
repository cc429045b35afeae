use crate::core::rates::CurrencyKind;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf};
use tracing::debug;

/// One currency the engine knows how to price.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CurrencySpec {
    pub code: String,
    pub name: String,
    pub kind: CurrencyKind,
    /// Upstream identifier where it differs from the code
    /// (e.g. CoinGecko coin id "bitcoin" for BTC).
    pub provider_id: Option<String>,
}

/// Catalog of known currencies, keyed by normalized code.
pub type CurrencyCatalog = HashMap<String, CurrencySpec>;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderEndpoint {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub er_api: Option<ProviderEndpoint>,
    pub frankfurter: Option<ProviderEndpoint>,
    pub coingecko: Option<ProviderEndpoint>,
    pub gold_api: Option<ProviderEndpoint>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            er_api: Some(ProviderEndpoint {
                base_url: "https://open.er-api.com".to_string(),
            }),
            frankfurter: Some(ProviderEndpoint {
                base_url: "https://api.frankfurter.dev".to_string(),
            }),
            coingecko: Some(ProviderEndpoint {
                base_url: "https://api.coingecko.com".to_string(),
            }),
            gold_api: Some(ProviderEndpoint {
                base_url: "https://api.gold-api.com".to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    /// Rates older than this are treated as absent.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    pub data_path: Option<String>,
}

fn default_ttl_secs() -> u64 {
    3600
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl_secs: default_ttl_secs(),
            data_path: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default = "default_currencies")]
    pub currencies: Vec<CurrencySpec>,
}

fn default_base_currency() -> String {
    "USD".to_string()
}

fn spec(code: &str, name: &str, kind: CurrencyKind, provider_id: Option<&str>) -> CurrencySpec {
    CurrencySpec {
        code: code.to_string(),
        name: name.to_string(),
        kind,
        provider_id: provider_id.map(str::to_string),
    }
}

fn default_currencies() -> Vec<CurrencySpec> {
    use CurrencyKind::*;
    vec![
        spec("USD", "US Dollar", Fiat, None),
        spec("EUR", "Euro", Fiat, None),
        spec("GBP", "British Pound", Fiat, None),
        spec("TRY", "Turkish Lira", Fiat, None),
        spec("AED", "UAE Dirham", Fiat, None),
        spec("BTC", "Bitcoin", Crypto, Some("bitcoin")),
        spec("ETH", "Ethereum", Crypto, Some("ethereum")),
        spec("USDT", "Tether", Crypto, Some("tether")),
        spec("XAU", "Gold", Metal, None),
        spec("XAG", "Silver", Metal, None),
    ]
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            base_currency: default_base_currency(),
            cache: CacheConfig::default(),
            providers: ProvidersConfig::default(),
            currencies: default_currencies(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "mithqal", "mithqal")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.cache.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "mithqal", "mithqal")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Catalog view of the configured currencies, keyed by code.
    pub fn catalog(&self) -> CurrencyCatalog {
        self.currencies
            .iter()
            .map(|c| (c.code.clone(), c.clone()))
            .collect()
    }
}
