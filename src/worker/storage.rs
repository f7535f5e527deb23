use std::collections::{BTreeMap, HashMap};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::RwLock;

use super::http::Response;

/// Named partitions of cached responses keyed by URL.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Creates the partition if it does not exist yet.
    async fn open(&self, partition: &str) -> Result<()>;
    async fn lookup(&self, partition: &str, url: &str) -> Result<Option<Response>>;
    async fn store(&self, partition: &str, url: &str, response: &Response) -> Result<()>;
    async fn partitions(&self) -> Result<Vec<String>>;
    /// Returns whether the partition existed.
    async fn delete(&self, partition: &str) -> Result<bool>;
}

#[derive(Default)]
pub struct MemoryCacheStorage {
    partitions: RwLock<BTreeMap<String, HashMap<String, Response>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry_count(&self, partition: &str) -> usize {
        self.partitions
            .read()
            .get(partition)
            .map(HashMap::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, partition: &str) -> Result<()> {
        self.partitions
            .write()
            .entry(partition.to_string())
            .or_default();
        Ok(())
    }

    async fn lookup(&self, partition: &str, url: &str) -> Result<Option<Response>> {
        Ok(self
            .partitions
            .read()
            .get(partition)
            .and_then(|entries| entries.get(url))
            .cloned())
    }

    async fn store(&self, partition: &str, url: &str, response: &Response) -> Result<()> {
        let mut guard = self.partitions.write();
        let entries = guard
            .get_mut(partition)
            .ok_or_else(|| anyhow!("cache partition '{partition}' is not open"))?;
        entries.insert(url.to_string(), response.clone());
        Ok(())
    }

    async fn partitions(&self) -> Result<Vec<String>> {
        Ok(self.partitions.read().keys().cloned().collect())
    }

    async fn delete(&self, partition: &str) -> Result<bool> {
        Ok(self.partitions.write().remove(partition).is_some())
    }
}
