use crate::store::{RateEntry, RateStore};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory rate store. Used by tests and as a fallback when no data
/// directory is available; freshness semantics match the disk store.
pub struct MemoryRateStore {
    inner: Arc<Mutex<HashMap<String, RateEntry>>>,
    ttl: Duration,
}

impl MemoryRateStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }
}

#[async_trait]
impl RateStore for MemoryRateStore {
    async fn get(&self, code: &str) -> Result<Option<RateEntry>> {
        let store = self.inner.lock().await;
        if let Some(entry) = store.get(code) {
            if entry.is_fresh(self.ttl, Utc::now()) {
                debug!("Rate cache HIT for {}", code);
                return Ok(Some(entry.clone()));
            }
            debug!("Rate cache entry expired for {}", code);
            return Ok(None);
        }
        debug!("Rate cache MISS for {}", code);
        Ok(None)
    }

    async fn upsert(&self, entry: RateEntry) -> Result<()> {
        let mut store = self.inner.lock().await;
        debug!("Rate cache PUT for {}", entry.code);
        store.insert(entry.code.clone(), entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryRateStore {
        MemoryRateStore::new(Duration::seconds(3600))
    }

    #[tokio::test]
    async fn upsert_and_get() {
        let store = store();

        assert!(store.get("USD").await.unwrap().is_none());

        store
            .upsert(RateEntry::new("USD", 1.0, Utc::now()))
            .await
            .unwrap();

        let entry = store.get("USD").await.unwrap().unwrap();
        assert_eq!(entry.usd_value, 1.0);

        assert!(store.get("EUR").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_entry_reported_absent() {
        let store = store();
        let now = Utc::now();

        // Just inside the TTL window
        store
            .upsert(RateEntry::new(
                "EUR",
                1.08,
                now - Duration::seconds(3599),
            ))
            .await
            .unwrap();
        assert!(store.get("EUR").await.unwrap().is_some());

        // Just past it
        store
            .upsert(RateEntry::new(
                "EUR",
                1.08,
                now - Duration::seconds(3601),
            ))
            .await
            .unwrap();
        assert!(store.get("EUR").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn last_write_wins() {
        let store = store();
        let now = Utc::now();

        store.upsert(RateEntry::new("BTC", 60000.0, now)).await.unwrap();
        store.upsert(RateEntry::new("BTC", 61000.0, now)).await.unwrap();

        let entry = store.get("BTC").await.unwrap().unwrap();
        assert_eq!(entry.usd_value, 61000.0);
    }

    #[tokio::test]
    async fn get_many_splits_fresh_and_stale() {
        let store = store();
        let now = Utc::now();

        store.upsert(RateEntry::new("USD", 1.0, now)).await.unwrap();
        store
            .upsert(RateEntry::new("EUR", 1.08, now - Duration::hours(2)))
            .await
            .unwrap();

        let codes: Vec<String> = ["USD", "EUR", "XAU"].iter().map(|s| s.to_string()).collect();
        let split = store.get_many(&codes).await.unwrap();

        assert_eq!(split.fresh.len(), 1);
        assert_eq!(split.fresh["USD"], 1.0);
        assert_eq!(split.stale, vec!["EUR".to_string(), "XAU".to_string()]);
    }
}
