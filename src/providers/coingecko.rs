//! Crypto price adapter (CoinGecko simple-price API)
//!
//! Tickers map to CoinGecko coin ids through the currency catalog; one
//! request prices the whole mapped batch. Tickers without a mapping fail
//! immediately without touching the network.

use crate::core::rates::{FetchOutcome, RateProvider};
use crate::providers::util::with_retry;
use crate::providers::{REQUEST_TIMEOUT, USER_AGENT};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub struct CoinGeckoProvider {
    base_url: String,
    /// Ticker (e.g. "BTC") -> CoinGecko coin id (e.g. "bitcoin").
    coin_ids: HashMap<String, String>,
    timeout: Duration,
}

impl CoinGeckoProvider {
    pub fn new(base_url: &str, coin_ids: HashMap<String, String>) -> Self {
        Self::with_timeout(base_url, coin_ids, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: &str,
        coin_ids: HashMap<String, String>,
        timeout: Duration,
    ) -> Self {
        CoinGeckoProvider {
            base_url: base_url.to_string(),
            coin_ids,
            timeout,
        }
    }

    async fn fetch_prices(&self, ids: &[&str]) -> Result<HashMap<String, CoinPrice>> {
        let url = format!(
            "{}/api/v3/simple/price?ids={}&vs_currencies=usd",
            self.base_url,
            ids.join(",")
        );
        debug!("Requesting crypto prices from {}", url);

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.timeout)
            .build()?;

        let response = with_retry(|| client.get(&url).send())
            .await
            .map_err(|e| anyhow!("Request error: {} for URL: {}", e, url))?;

        if !response.status().is_success() {
            return Err(anyhow!("HTTP error: {} from {}", response.status(), url));
        }

        Ok(response.json::<HashMap<String, CoinPrice>>().await?)
    }
}

#[derive(Deserialize, Debug)]
struct CoinPrice {
    usd: Option<f64>,
}

#[async_trait]
impl RateProvider for CoinGeckoProvider {
    fn name(&self) -> &str {
        "coingecko"
    }

    #[instrument(name = "CoinGeckoFetch", skip(self), fields(codes = codes.len()))]
    async fn fetch_rates(&self, codes: &[String]) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();

        let mut mapped: Vec<(&String, &str)> = Vec::new();
        for code in codes {
            match self.coin_ids.get(code) {
                Some(id) => mapped.push((code, id)),
                None => {
                    debug!("No coin id mapping for {}", code);
                    outcome.failed.push(code.clone());
                }
            }
        }
        if mapped.is_empty() {
            return outcome;
        }

        let ids: Vec<&str> = mapped.iter().map(|(_, id)| *id).collect();
        let prices = match self.fetch_prices(&ids).await {
            Ok(prices) => prices,
            Err(e) => {
                warn!("Crypto price fetch failed: {}", e);
                outcome.failed.extend(mapped.iter().map(|(c, _)| (*c).clone()));
                return outcome;
            }
        };

        for (code, id) in mapped {
            match prices.get(id).and_then(|p| p.usd) {
                Some(usd) if usd > 0.0 => {
                    outcome.rates.insert(code.clone(), usd);
                }
                _ => outcome.failed.push(code.clone()),
            }
        }
        outcome
    }
}
