//! Commodity/metal spot-price adapter (gold-api.com style)
//!
//! Upstream quotes USD per troy ounce, one symbol per request. Prices are
//! converted to USD per gram before they leave the adapter, so every other
//! component only ever sees per-gram values.

use crate::core::gold::TROY_OUNCE_GRAMS;
use crate::core::rates::{FetchOutcome, RateProvider};
use crate::providers::util::with_retry;
use crate::providers::{REQUEST_TIMEOUT, USER_AGENT};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub struct GoldApiProvider {
    base_url: String,
    timeout: Duration,
}

impl GoldApiProvider {
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        GoldApiProvider {
            base_url: base_url.to_string(),
            timeout,
        }
    }

    async fn fetch_spot(&self, code: &str) -> Result<f64> {
        let url = format!("{}/price/{}", self.base_url, code);
        debug!("Requesting metal spot price from {}", url);

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.timeout)
            .build()?;

        let response = with_retry(|| client.get(&url).send())
            .await
            .map_err(|e| anyhow!("Request error: {} for metal: {}", e, code))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for metal: {}",
                response.status(),
                code
            ));
        }

        let data = response.json::<SpotPriceResponse>().await?;
        if data.price <= 0.0 {
            return Err(anyhow!("Non-positive spot price for metal: {}", code));
        }
        Ok(data.price / TROY_OUNCE_GRAMS)
    }
}

#[derive(Deserialize, Debug)]
struct SpotPriceResponse {
    /// USD per troy ounce.
    price: f64,
}

#[async_trait]
impl RateProvider for GoldApiProvider {
    fn name(&self) -> &str {
        "gold-api"
    }

    #[instrument(name = "MetalSpotFetch", skip(self), fields(codes = codes.len()))]
    async fn fetch_rates(&self, codes: &[String]) -> FetchOutcome {
        let fetches = codes.iter().map(|code| async move {
            (code.clone(), self.fetch_spot(code).await)
        });

        let mut outcome = FetchOutcome::default();
        for (code, result) in join_all(fetches).await {
            match result {
                Ok(usd_per_gram) => {
                    outcome.rates.insert(code, usd_per_gram);
                }
                Err(e) => {
                    warn!("Metal spot fetch failed for {}: {}", code, e);
                    outcome.failed.push(code);
                }
            }
        }
        outcome
    }
}
