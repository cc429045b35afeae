//! Primary fiat FX adapter (open.er-api.com)
//!
//! One request prices the whole batch: the upstream returns every quoted
//! currency against USD. Rates come back as units per USD and are inverted
//! to USD-per-unit before leaving the adapter.

use crate::core::rates::{FetchOutcome, RateProvider};
use crate::providers::util::with_retry;
use crate::providers::{REQUEST_TIMEOUT, USER_AGENT};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub struct OpenErApiProvider {
    base_url: String,
    timeout: Duration,
}

impl OpenErApiProvider {
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        OpenErApiProvider {
            base_url: base_url.to_string(),
            timeout,
        }
    }

    async fn fetch_table(&self) -> Result<HashMap<String, f64>> {
        let url = format!("{}/v6/latest/USD", self.base_url);
        debug!("Requesting fiat rates from {}", url);

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

        let data = response.json::<ErApiResponse>().await?;
        if data.result != "success" {
            return Err(anyhow!("Upstream reported result: {}", data.result));
        }
        Ok(data.rates)
    }
}

#[derive(Deserialize, Debug)]
struct ErApiResponse {
    result: String,
    /// Units of each currency per 1 USD.
    rates: HashMap<String, f64>,
}

#[async_trait]
impl RateProvider for OpenErApiProvider {
    fn name(&self) -> &str {
        "open-er-api"
    }

    #[instrument(name = "ErApiFetch", skip(self), fields(codes = codes.len()))]
    async fn fetch_rates(&self, codes: &[String]) -> FetchOutcome {
        let table = match self.fetch_table().await {
            Ok(table) => table,
            Err(e) => {
                warn!("Fiat rate fetch failed: {}", e);
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
