//! Rate aggregation core types and the provider capability

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which upstream family prices a currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyKind {
    Fiat,
    Crypto,
    Metal,
}

/// What one adapter managed to resolve for a batch of codes.
///
/// Adapters never surface upstream failures as errors; codes that could not
/// be priced land in `failed` and the rest of the batch is still usable.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Code -> USD value of one unit. Gold is USD per gram.
    pub rates: HashMap<String, f64>,
    pub failed: Vec<String>,
}

impl FetchOutcome {
    /// Outcome for a wholesale upstream failure: every requested code failed.
    pub fn all_failed(codes: &[String]) -> Self {
        Self {
            rates: HashMap::new(),
            failed: codes.to_vec(),
        }
    }
}

/// One upstream source that can resolve USD values for a set of codes.
#[async_trait]
pub trait RateProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_rates(&self, codes: &[String]) -> FetchOutcome;
}

/// Consolidated result of one aggregation call. Transient, never persisted.
#[derive(Debug, Clone, Default)]
pub struct RateResult {
    /// True iff at minimum the base currency and gold resolved.
    pub success: bool,
    /// Code -> USD value of one unit, fresh within the cache TTL.
    pub usd_rates: HashMap<String, f64>,
    /// USD per gram of gold, from this call's single spot snapshot.
    pub gold_price_usd: f64,
    pub errors: Vec<String>,
    pub from_cache: Vec<String>,
    pub newly_fetched: Vec<String>,
    pub not_found: Vec<String>,
}

impl RateResult {
    pub fn usd_value(&self, code: &str) -> Option<f64> {
        self.usd_rates.get(code).copied()
    }
}

/// Canonical form of a currency code: trimmed, uppercase.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_uppercases() {
        assert_eq!(normalize_code(" btc "), "BTC");
        assert_eq!(normalize_code("Xau"), "XAU");
    }

    #[test]
    fn all_failed_carries_every_code() {
        let codes = vec!["EUR".to_string(), "GBP".to_string()];
        let outcome = FetchOutcome::all_failed(&codes);
        assert!(outcome.rates.is_empty());
        assert_eq!(outcome.failed, codes);
    }
}
