pub mod cli;
pub mod convert;
pub mod core;
pub mod providers;
pub mod service;
pub mod store;

use crate::core::config::AppConfig;
use crate::providers::coingecko::CoinGeckoProvider;
use crate::providers::er_api::OpenErApiProvider;
use crate::providers::frankfurter::FrankfurterProvider;
use crate::providers::gold_api::GoldApiProvider;
use crate::service::{ExchangeRateService, ProviderChains};
use crate::store::RateStore;
use crate::store::disk::DiskRateStore;
use anyhow::Result;
use chrono::Duration;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    /// Fetch and display rates for a set of codes (catalog when empty).
    Rates(Vec<String>),
    /// Convert a YAML file of monetary entries into the base currency.
    Value(String),
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Rate engine starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let ttl = Duration::seconds(config.cache.ttl_secs as i64);
    let cache_dir = config.default_data_path()?.join("cache");
    let store: Arc<dyn RateStore> = Arc::new(DiskRateStore::open(&cache_dir, ttl)?);

    let service = build_service(&config, store);

    match command {
        AppCommand::Rates(codes) => cli::rates::run(&service, &codes).await,
        AppCommand::Value(path) => cli::value::run(&service, &path).await,
    }
}

/// Wires the provider chains from the config. The service owns the whole
/// pricing stack; callers receive it fully constructed.
pub fn build_service(config: &AppConfig, store: Arc<dyn RateStore>) -> ExchangeRateService {
    let catalog = config.catalog();

    let mut chains = ProviderChains::default();
    if let Some(endpoint) = &config.providers.er_api {
        chains
            .fiat
            .push(Arc::new(OpenErApiProvider::new(&endpoint.base_url)));
    }
    if let Some(endpoint) = &config.providers.frankfurter {
        chains
            .fiat
            .push(Arc::new(FrankfurterProvider::new(&endpoint.base_url)));
    }
    if let Some(endpoint) = &config.providers.coingecko {
        let coin_ids: HashMap<String, String> = catalog
            .values()
            .filter_map(|spec| {
                spec.provider_id
                    .clone()
                    .map(|id| (spec.code.clone(), id))
            })
            .collect();
        chains
            .crypto
            .push(Arc::new(CoinGeckoProvider::new(&endpoint.base_url, coin_ids)));
    }
    if let Some(endpoint) = &config.providers.gold_api {
        chains
            .metal
            .push(Arc::new(GoldApiProvider::new(&endpoint.base_url)));
    }

    ExchangeRateService::new(store, chains, catalog, &config.base_currency)
}
