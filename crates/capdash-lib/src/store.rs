//! Report cache
//!
//! The reconciled report is memoised in a [`ReportStore`] under a fixed key.
//! Values are opaque JSON strings; expiry is the store's responsibility.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Key/value store with per-entry TTL
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Fetch a live value, `None` if absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    async fn invalidate(&self, key: &str) -> Result<()>;
}

struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process TTL store
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until next access
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Expired; drop it unless it was refreshed in the meantime
        let mut entries = self.entries.write().await;
        if entries
            .get(key)
            .map(|e| e.expires_at <= Instant::now())
            .unwrap_or(false)
        {
            entries.remove(key);
            debug!(key = %key, "Evicted expired cache entry");
        }
        Ok(None)
    }

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
