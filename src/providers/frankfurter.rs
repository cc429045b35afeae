//! Fallback fiat FX adapter (frankfurter.dev)
//!
//! Consulted only for codes the primary fiat source failed. Same wire
//! semantics as the primary: units per USD, inverted before return.

use crate::core::rates::{FetchOutcome, RateProvider};
use crate::providers::util::with_retry;
use crate::providers::{REQUEST_TIMEOUT, USER_AGENT};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub struct FrankfurterProvider {
    base_url: String,
    timeout: Duration,
}

impl FrankfurterProvider {
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        FrankfurterProvider {
            base_url: base_url.to_string(),
            timeout,
        }
    }

    async fn fetch_table(&self) -> Result<HashMap<String, f64>> {
        let url = format!("{}/v1/latest?base=USD", self.base_url);
        debug!("Requesting fallback fiat rates from {}", url);

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

        let data = response.json::<FrankfurterResponse>().await?;
        let mut rates = data.rates;
        // The upstream omits the base currency from its own table
        rates.entry(data.base).or_insert(1.0);
        Ok(rates)
    }
}

#[derive(Deserialize, Debug)]
struct FrankfurterResponse {
    base: String,
    /// Units of each currency per 1 USD.
    rates: HashMap<String, f64>,
}

#[async_trait]
impl RateProvider for FrankfurterProvider {
    fn name(&self) -> &str {
        "frankfurter"
    }

    #[instrument(name = "FrankfurterFetch", skip(self), fields(codes = codes.len()))]
    async fn fetch_rates(&self, codes: &[String]) -> FetchOutcome {
        let table = match self.fetch_table().await {
            Ok(table) => table,
            Err(e) => {
                warn!("Fallback fiat rate fetch failed: {}", e);
                return FetchOutcome::all_failed(codes);
            }
        };

        let mut outcome = FetchOutcome::default();
        for code in codes {
            match table.get(code) {
                Some(units_per_usd) if *units_per_usd > 0.0 => {
                    outcome.rates.insert(code.clone(), 1.0 / units_per_usd);
                }
                _ => outcome.failed.push(code.clone()),
            }
        }
        outcome
    }
}
