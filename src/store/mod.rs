//! Durable rate cache
//!
//! One row per currency code, upserted on refresh. A row older than the TTL
//! is reported absent, never served. Store failures are real errors and
//! propagate to the aggregation caller; without the cache the aggregator
//! cannot reason about freshness.

pub mod disk;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One cached rate. `fetched_at` is explicit so freshness is testable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateEntry {
    pub code: String,
    /// USD value of one unit of the currency. Gold is USD per gram.
    pub usd_value: f64,
    pub fetched_at: DateTime<Utc>,
}

impl RateEntry {
    pub fn new(code: impl Into<String>, usd_value: f64, fetched_at: DateTime<Utc>) -> Self {
        Self {
            code: code.into(),
            usd_value,
            fetched_at,
        }
    }

    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.fetched_at < ttl
    }
}

/// Batch freshness answer for the aggregator.
#[derive(Debug, Default)]
pub struct FreshnessSplit {
    /// Codes with a within-TTL entry, with their USD values.
    pub fresh: HashMap<String, f64>,
    /// Codes absent or past TTL; these need an upstream fetch.
    pub stale: Vec<String>,
}

#[async_trait]
pub trait RateStore: Send + Sync {
    /// Returns the entry only while it is within the TTL.
    async fn get(&self, code: &str) -> Result<Option<RateEntry>>;

    /// Idempotent; a later write for the same code replaces the earlier one.
    async fn upsert(&self, entry: RateEntry) -> Result<()>;

    /// Batch form of [`get`](RateStore::get) used by the aggregator.
    async fn get_many(&self, codes: &[String]) -> Result<FreshnessSplit> {
        let mut split = FreshnessSplit::default();
        for code in codes {
            match self.get(code).await? {
                Some(entry) => {
                    split.fresh.insert(code.clone(), entry.usd_value);
                }
                None => split.stale.push(code.clone()),
            }
        }
        Ok(split)
    }
}
