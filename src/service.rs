//! Rate aggregator
//!
//! One `ExchangeRateService` instance is constructed at process startup and
//! shared by every caller, so all callers see one cache and one in-flight
//! table. For a requested set of codes it serves what the cache holds fresh,
//! fetches the rest from the provider chain responsible for each currency
//! kind, and always returns a best-effort [`RateResult`] -- individual
//! unpriced codes are reported, never fatal.

use crate::core::config::CurrencyCatalog;
use crate::core::gold::GOLD_CODE;
use crate::core::rates::{CurrencyKind, FetchOutcome, RateProvider, RateResult, normalize_code};
use crate::store::{RateEntry, RateStore};
use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, instrument, warn};

/// Ordered upstream chains per currency kind. Within a chain, codes failed
/// by one provider are offered to the next; the first resolved value wins.
#[derive(Default)]
pub struct ProviderChains {
    pub fiat: Vec<Arc<dyn RateProvider>>,
    pub crypto: Vec<Arc<dyn RateProvider>>,
    pub metal: Vec<Arc<dyn RateProvider>>,
}

impl ProviderChains {
    fn for_kind(&self, kind: CurrencyKind) -> &[Arc<dyn RateProvider>] {
        match kind {
            CurrencyKind::Fiat => &self.fiat,
            CurrencyKind::Crypto => &self.crypto,
            CurrencyKind::Metal => &self.metal,
        }
    }
}

pub struct ExchangeRateService {
    store: Arc<dyn RateStore>,
    chains: ProviderChains,
    catalog: CurrencyCatalog,
    base_currency: String,
    /// At most one upstream fetch per code may be in flight; concurrent
    /// callers for the same stale code wait on the claimer's broadcast.
    inflight: Mutex<HashMap<String, broadcast::Sender<Option<f64>>>>,
}

impl ExchangeRateService {
    pub fn new(
        store: Arc<dyn RateStore>,
        chains: ProviderChains,
        catalog: CurrencyCatalog,
        base_currency: &str,
    ) -> Self {
        Self {
            store,
            chains,
            catalog,
            base_currency: normalize_code(base_currency),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn base_currency(&self) -> &str {
        &self.base_currency
    }

    pub fn catalog(&self) -> &CurrencyCatalog {
        &self.catalog
    }

    /// Resolves fresh USD values for the requested codes, fetching only what
    /// the cache cannot serve. The base currency and gold are always part of
    /// the request; both must resolve for `success` to be true.
    ///
    /// Only cache failures are errors. Upstream failures degrade the result:
    /// affected codes land in `not_found` and the call still returns.
    #[instrument(name = "GetRates", skip(self, codes))]
    pub async fn get_rates(&self, codes: &[String]) -> Result<RateResult> {
        let requested = self.requested_set(codes);
        debug!("Aggregating rates for {} codes", requested.len());

        let mut result = RateResult::default();

        let split = self.store.get_many(&requested).await?;
        for (code, usd) in split.fresh {
            result.usd_rates.insert(code.clone(), usd);
            result.from_cache.push(code);
        }

        // Split stale codes into ones this call will fetch (claimed) and
        // ones another call is already fetching (waiting).
        let mut claimed: Vec<String> = Vec::new();
        let mut waiting: Vec<(String, broadcast::Receiver<Option<f64>>)> = Vec::new();
        {
            let mut inflight = self.inflight.lock().await;
            for code in split.stale {
                if let Some(tx) = inflight.get(&code) {
                    waiting.push((code, tx.subscribe()));
                } else {
                    let (tx, _) = broadcast::channel(1);
                    inflight.insert(code.clone(), tx);
                    claimed.push(code);
                }
            }
        }

        let (resolved, unresolved) = self.fetch_claimed(&claimed).await;

        // Waiters are released before the cache write so a store failure
        // cannot leave them hanging.
        {
            let mut inflight = self.inflight.lock().await;
            for code in &claimed {
                if let Some(tx) = inflight.remove(code) {
                    let _ = tx.send(resolved.get(code).copied());
                }
            }
        }

        let now = Utc::now();
        for (code, usd) in resolved {
            self.store
                .upsert(RateEntry::new(code.clone(), usd, now))
                .await?;
            result.usd_rates.insert(code.clone(), usd);
            result.newly_fetched.push(code);
        }
        result.not_found.extend(unresolved);

        for (code, mut rx) in waiting {
            match rx.recv().await {
                Ok(Some(usd)) => {
                    result.usd_rates.insert(code.clone(), usd);
                    result.newly_fetched.push(code);
                }
                _ => result.not_found.push(code),
            }
        }

        self.finalize(&mut result);
        Ok(result)
    }

    /// Normalized, deduplicated request set with base and gold forced in.
    fn requested_set(&self, codes: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut requested = Vec::new();
        for code in codes
            .iter()
            .map(|c| normalize_code(c))
            .chain([self.base_currency.clone(), GOLD_CODE.to_string()])
        {
            if seen.insert(code.clone()) {
                requested.push(code);
            }
        }
        requested
    }

    /// Dispatches the claimed codes to the chain responsible for each
    /// currency kind; chains run concurrently, each provider at most once.
    async fn fetch_claimed(&self, claimed: &[String]) -> (HashMap<String, f64>, Vec<String>) {
        let mut by_kind: HashMap<CurrencyKind, Vec<String>> = HashMap::new();
        let mut unresolved: Vec<String> = Vec::new();
        for code in claimed {
            match self.catalog.get(code) {
                Some(spec) => by_kind.entry(spec.kind).or_default().push(code.clone()),
                None => {
                    debug!("Unknown currency code {}", code);
                    unresolved.push(code.clone());
                }
            }
        }

        let fetches = by_kind.into_iter().map(|(kind, codes)| {
            let chain = self.chains.for_kind(kind);
            async move { run_chain(chain, codes).await }
        });

        let mut resolved = HashMap::new();
        for outcome in join_all(fetches).await {
            resolved.extend(outcome.rates);
            unresolved.extend(outcome.failed);
        }
        (resolved, unresolved)
    }

    fn finalize(&self, result: &mut RateResult) {
        if let Some(gold) = result.usd_value(GOLD_CODE) {
            result.gold_price_usd = gold;
        }

        let base_ok = result.usd_rates.contains_key(&self.base_currency);
        let gold_ok = result.gold_price_usd > 0.0;
        result.success = base_ok && gold_ok;

        if !base_ok {
            let msg = format!("Base currency {} could not be priced", self.base_currency);
            warn!("{}", msg);
            result.errors.push(msg);
        }
        if !gold_ok {
            let msg = "Gold spot price unavailable; values cannot be normalized".to_string();
            warn!("{}", msg);
            result.errors.push(msg);
        }
    }
}

/// Runs one provider chain over a batch: failures from provider `i` are
/// offered to provider `i+1`, so the primary's value always wins when it has
/// one. Whatever the last provider still failed stays failed.
async fn run_chain(chain: &[Arc<dyn RateProvider>], codes: Vec<String>) -> FetchOutcome {
    let mut merged = FetchOutcome::default();
    let mut remaining = codes;

    for provider in chain {
        if remaining.is_empty() {
            break;
        }
        let outcome = provider.fetch_rates(&remaining).await;
        debug!(
            "{} resolved {}/{} codes",
            provider.name(),
            outcome.rates.len(),
            remaining.len()
        );
        merged.rates.extend(outcome.rates);
        remaining = outcome.failed;
    }

    merged.failed = remaining;
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AppConfig;
    use crate::store::memory::MemoryRateStore;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    /// Scripted provider: resolves the configured codes, fails the rest,
    /// counts invocations, optionally stalls to widen race windows.
    struct MockProvider {
        name: String,
        rates: HashMap<String, f64>,
        calls: AtomicUsize,
        delay: Option<StdDuration>,
    }

    impl MockProvider {
        fn new(name: &str, rates: &[(&str, f64)]) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                rates: rates.iter().map(|(c, v)| (c.to_string(), *v)).collect(),
                calls: AtomicUsize::new(0),
                delay: None,
            })
        }

        fn slow(name: &str, rates: &[(&str, f64)], delay: StdDuration) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                rates: rates.iter().map(|(c, v)| (c.to_string(), *v)).collect(),
                calls: AtomicUsize::new(0),
                delay: Some(delay),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RateProvider for MockProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn fetch_rates(&self, codes: &[String]) -> FetchOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let mut outcome = FetchOutcome::default();
            for code in codes {
                match self.rates.get(code) {
                    Some(usd) => {
                        outcome.rates.insert(code.clone(), *usd);
                    }
                    None => outcome.failed.push(code.clone()),
                }
            }
            outcome
        }
    }

    fn service(chains: ProviderChains) -> ExchangeRateService {
        let store = Arc::new(MemoryRateStore::new(Duration::seconds(3600)));
        ExchangeRateService::new(store, chains, AppConfig::default().catalog(), "USD")
    }

    fn codes(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn fetches_base_and_gold_even_when_unrequested() {
        let fiat = MockProvider::new("fiat", &[("USD", 1.0)]);
        let metal = MockProvider::new("metal", &[("XAU", 77.0)]);
        let svc = service(ProviderChains {
            fiat: vec![fiat.clone()],
            crypto: vec![],
            metal: vec![metal.clone()],
        });

        let result = svc.get_rates(&[]).await.unwrap();

        assert!(result.success);
        assert_eq!(result.usd_rates["USD"], 1.0);
        assert_eq!(result.gold_price_usd, 77.0);
        assert!(result.errors.is_empty());
        assert_eq!(fiat.calls(), 1);
        assert_eq!(metal.calls(), 1);
    }

    #[tokio::test]
    async fn second_call_served_from_cache() {
        let fiat = MockProvider::new("fiat", &[("USD", 1.0), ("EUR", 1.1)]);
        let metal = MockProvider::new("metal", &[("XAU", 77.0)]);
        let svc = service(ProviderChains {
            fiat: vec![fiat.clone()],
            crypto: vec![],
            metal: vec![metal.clone()],
        });

        let first = svc.get_rates(&codes(&["EUR"])).await.unwrap();
        assert_eq!(first.newly_fetched.len(), 3);
        assert!(first.from_cache.is_empty());

        let second = svc.get_rates(&codes(&["EUR"])).await.unwrap();
        assert!(second.success);
        assert_eq!(second.from_cache.len(), 3);
        assert!(second.newly_fetched.is_empty());
        assert_eq!(fiat.calls(), 1);
        assert_eq!(metal.calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_calls_coalesce_into_one_fetch() {
        let fiat = MockProvider::slow(
            "fiat",
            &[("USD", 1.0), ("EUR", 1.1)],
            StdDuration::from_millis(50),
        );
        let metal = MockProvider::slow("metal", &[("XAU", 77.0)], StdDuration::from_millis(50));
        let svc = Arc::new(service(ProviderChains {
            fiat: vec![fiat.clone()],
            crypto: vec![],
            metal: vec![metal.clone()],
        }));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let svc = Arc::clone(&svc);
                tokio::spawn(async move { svc.get_rates(&["EUR".to_string()]).await.unwrap() })
            })
            .collect();

        for task in tasks {
            let result = task.await.unwrap();
            assert!(result.success);
            assert_eq!(result.usd_rates["EUR"], 1.1);
        }

        assert_eq!(fiat.calls(), 1, "stale EUR must be fetched exactly once");
        assert_eq!(metal.calls(), 1);
    }

    #[tokio::test]
    async fn crypto_outage_degrades_without_failing() {
        let fiat = MockProvider::new("fiat", &[("USD", 1.0)]);
        let crypto = MockProvider::new("crypto", &[]);
        let metal = MockProvider::new("metal", &[("XAU", 77.0)]);
        let svc = service(ProviderChains {
            fiat: vec![fiat],
            crypto: vec![crypto.clone()],
            metal: vec![metal],
        });

        let result = svc.get_rates(&codes(&["BTC", "ETH"])).await.unwrap();

        assert!(result.success, "base and gold resolved, so the call succeeds");
        assert!(result.not_found.contains(&"BTC".to_string()));
        assert!(result.not_found.contains(&"ETH".to_string()));
        assert!(!result.usd_rates.contains_key("BTC"));
        assert_eq!(crypto.calls(), 1);
    }

    #[tokio::test]
    async fn fallback_covers_primary_failures_only() {
        let primary = MockProvider::new("primary", &[("USD", 1.0), ("EUR", 1.10)]);
        let fallback = MockProvider::new("fallback", &[("EUR", 9.99), ("GBP", 1.30)]);
        let metal = MockProvider::new("metal", &[("XAU", 77.0)]);
        let svc = service(ProviderChains {
            fiat: vec![primary.clone(), fallback.clone()],
            crypto: vec![],
            metal: vec![metal],
        });

        let result = svc.get_rates(&codes(&["EUR", "GBP"])).await.unwrap();

        assert!(result.success);
        // Primary's EUR wins; fallback only sees what the primary failed
        assert_eq!(result.usd_rates["EUR"], 1.10);
        assert_eq!(result.usd_rates["GBP"], 1.30);
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn fallback_skipped_when_primary_resolves_everything() {
        let primary = MockProvider::new("primary", &[("USD", 1.0), ("EUR", 1.10)]);
        let fallback = MockProvider::new("fallback", &[("EUR", 9.99)]);
        let metal = MockProvider::new("metal", &[("XAU", 77.0)]);
        let svc = service(ProviderChains {
            fiat: vec![primary, fallback.clone()],
            crypto: vec![],
            metal: vec![metal],
        });

        let result = svc.get_rates(&codes(&["EUR"])).await.unwrap();
        assert!(result.success);
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn missing_gold_rate_reported_as_best_effort_failure() {
        let fiat = MockProvider::new("fiat", &[("USD", 1.0), ("EUR", 1.1)]);
        let metal = MockProvider::new("metal", &[]);
        let svc = service(ProviderChains {
            fiat: vec![fiat],
            crypto: vec![],
            metal: vec![metal],
        });

        let result = svc.get_rates(&codes(&["EUR"])).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.gold_price_usd, 0.0);
        assert!(!result.errors.is_empty());
        // Best effort: the fiat rates are still usable
        assert_eq!(result.usd_rates["EUR"], 1.1);
        assert!(result.not_found.contains(&GOLD_CODE.to_string()));
    }

    #[tokio::test]
    async fn unknown_code_goes_to_not_found_without_fetch() {
        let fiat = MockProvider::new("fiat", &[("USD", 1.0)]);
        let metal = MockProvider::new("metal", &[("XAU", 77.0)]);
        let svc = service(ProviderChains {
            fiat: vec![fiat.clone()],
            crypto: vec![],
            metal: vec![metal],
        });

        let result = svc.get_rates(&codes(&["ZZZ"])).await.unwrap();

        assert!(result.success);
        assert_eq!(result.not_found, vec!["ZZZ".to_string()]);
        // Only the fiat batch for USD was dispatched
        assert_eq!(fiat.calls(), 1);
    }

    #[tokio::test]
    async fn codes_are_normalized_and_deduplicated() {
        let fiat = MockProvider::new("fiat", &[("USD", 1.0), ("EUR", 1.1)]);
        let metal = MockProvider::new("metal", &[("XAU", 77.0)]);
        let svc = service(ProviderChains {
            fiat: vec![fiat.clone()],
            crypto: vec![],
            metal: vec![metal],
        });

        let result = svc
            .get_rates(&codes(&["eur", " EUR ", "Eur"]))
            .await
            .unwrap();

        assert_eq!(result.usd_rates["EUR"], 1.1);
        assert_eq!(
            result
                .newly_fetched
                .iter()
                .filter(|c| c.as_str() == "EUR")
                .count(),
            1
        );
    }
}
