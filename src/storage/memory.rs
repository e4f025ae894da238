use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::{DurableStore, StorageResult};
use crate::error::StorageError;

/// In-process store. Clones share the same map.
///
/// `latency` is slept before every read and every write, which hands control back to
/// the scheduler the way a real storage round-trip does.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<Map<String, Value>>>,
    latency: Option<Duration>,
    failing: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Seeds a raw value, bypassing any latency.
    pub async fn insert_raw(&self, key: &str, value: Value) {
        self.entries.lock().await.insert(key.to_owned(), value);
    }

    pub async fn raw(&self, key: &str) -> Option<Value> {
        self.entries.lock().await.get(key).cloned()
    }

    /// Makes every subsequent call fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    async fn round_trip(&self) -> StorageResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("memory store is failing".into()));
        }
        Ok(())
    }
}

impl DurableStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> StorageResult<Map<String, Value>> {
        self.round_trip().await?;
        let entries = self.entries.lock().await;
        Ok(keys
            .iter()
            .filter_map(|key| entries.get(*key).map(|value| ((*key).to_owned(), value.clone())))
            .collect())
    }

    async fn set(&self, items: Map<String, Value>) -> StorageResult<()> {
        self.round_trip().await?;
        self.entries.lock().await.extend(items);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_returns_only_present_keys() {
        let store = MemoryStore::new();
        let mut items = Map::new();
        items.insert("a".to_string(), json!(1));
        store.set(items).await.unwrap();

        let got = store.get(&["a", "b"]).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got.get("a"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_failing_store_rejects_calls() {
        let store = MemoryStore::new();
        store.set_failing(true);
        assert!(store.get(&["a"]).await.is_err());
        assert!(store.set(Map::new()).await.is_err());

        store.set_failing(false);
        assert!(store.get(&["a"]).await.is_ok());
    }
}
