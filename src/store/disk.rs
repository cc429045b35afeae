use crate::store::{RateEntry, RateStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle};
use std::path::Path;
use tracing::debug;

/// Rate store persisted in a fjall partition. Entries survive process
/// restarts; freshness is decided at read time against the TTL, so old rows
/// need no background sweeping.
pub struct DiskRateStore {
    _keyspace: Keyspace,
    partition: PartitionHandle,
    ttl: Duration,
}

impl DiskRateStore {
    pub fn open(path: &Path, ttl: Duration) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create cache directory: {}", path.display()))?;

        let keyspace = fjall::Config::new(path.join("rates"))
            .open()
            .with_context(|| format!("Failed to open rate cache at {}", path.display()))?;
        let partition = keyspace
            .open_partition("rates", PartitionCreateOptions::default())
            .context("Failed to open rates partition")?;

        Ok(Self {
            _keyspace: keyspace,
            partition,
            ttl,
        })
    }
}

#[async_trait]
impl RateStore for DiskRateStore {
    async fn get(&self, code: &str) -> Result<Option<RateEntry>> {
        let Some(bytes) = self
            .partition
            .get(code)
            .with_context(|| format!("Rate cache read failed for {code}"))?
        else {
            debug!("Rate cache MISS for {}", code);
            return Ok(None);
        };

        let entry: RateEntry = serde_json::from_slice(&bytes)
            .with_context(|| format!("Corrupt rate cache entry for {code}"))?;

        if !entry.is_fresh(self.ttl, Utc::now()) {
            debug!("Rate cache entry expired for {}", code);
            return Ok(None);
        }

        debug!("Rate cache HIT for {}", code);
        Ok(Some(entry))
    }

    async fn upsert(&self, entry: RateEntry) -> Result<()> {
        let bytes = serde_json::to_vec(&entry)?;
        self.partition
            .insert(&entry.code, bytes)
            .with_context(|| format!("Rate cache write failed for {}", entry.code))?;
        debug!("Rate cache PUT for {}", entry.code);
        Ok(())
    }
}
