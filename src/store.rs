//! Per-page highlight records on top of a [`DurableStore`].
//!
//! The whole [`PersistedDocument`] lives under one key and is read and rewritten on
//! every mutation. Nothing serializes those read-modify-write cycles: two saves that
//! overlap both read the old document and the later write drops the earlier record.

use serde_json::{Map, Value};

use crate::model::{HighlightRecord, PageSummary, PersistedDocument};
use crate::storage::{DurableStore, StorageResult};

pub const DEFAULT_STORAGE_KEY: &str = "highlightedRanges";

pub struct HighlightStore<S> {
    backend: S,
    key: String,
}

impl<S: DurableStore> HighlightStore<S> {
    pub fn new(backend: S) -> Self {
        Self::with_key(backend, DEFAULT_STORAGE_KEY)
    }

    pub fn with_key(backend: S, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Highlights of `url` in creation order; empty when the page has none.
    pub async fn get(&self, url: &str) -> StorageResult<Vec<HighlightRecord>> {
        let mut document = self.load().await?;
        Ok(document.remove(url).unwrap_or_default())
    }

    /// Appends `record` to the highlights of `url`.
    pub async fn save(&self, url: &str, record: HighlightRecord) -> StorageResult<()> {
        let mut document = self.load().await?;
        document.entry(url.to_owned()).or_default().push(record);
        self.write(document).await
    }

    /// Drops every highlight of `url` stored under `address`. Returns how many went.
    pub async fn delete(&self, url: &str, address: &str) -> StorageResult<usize> {
        let mut document = self.load().await?;
        let Some(page) = document.get_mut(url) else {
            return Ok(0);
        };
        let before = page.len();
        page.retain(|record| record.address != address);
        let removed = before - page.len();
        if removed > 0 {
            self.write(document).await?;
        }
        Ok(removed)
    }

    /// Every page that has an entry, with its highlight count.
    pub async fn pages(&self) -> StorageResult<Vec<PageSummary>> {
        Ok(self
            .load()
            .await?
            .into_iter()
            .map(|(url, records)| PageSummary {
                url,
                highlights: records.len(),
            })
            .collect())
    }

    /// Forgets every highlight of `url`. Returns how many were dropped.
    pub async fn clear(&self, url: &str) -> StorageResult<usize> {
        let mut document = self.load().await?;
        let Some(records) = document.remove(url) else {
            return Ok(0);
        };
        self.write(document).await?;
        Ok(records.len())
    }

    async fn load(&self) -> StorageResult<PersistedDocument> {
        let mut values = self.backend.get(&[self.key.as_str()]).await?;
        Ok(values
            .remove(&self.key)
            .map(|raw| decode_document(&self.key, raw))
            .unwrap_or_default())
    }

    async fn write(&self, document: PersistedDocument) -> StorageResult<()> {
        let mut items = Map::new();
        items.insert(self.key.clone(), serde_json::to_value(document)?);
        self.backend.set(items).await
    }
}

/// Decodes whatever is stored under the key, keeping every well-formed record and
/// skipping the rest.
fn decode_document(key: &str, raw: Value) -> PersistedDocument {
    let Value::Object(pages) = raw else {
        tracing::warn!(key, "persisted highlights are not an object, ignoring them");
        return PersistedDocument::new();
    };

    let mut document = PersistedDocument::new();
    for (url, page) in pages {
        let Value::Array(entries) = page else {
            tracing::warn!(url = %url, "page highlights are not a list, skipping page");
            continue;
        };
        let records = entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match serde_json::from_value(entry) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(url = %url, index, error = %e, "skipping malformed highlight");
                    None
                }
            })
            .collect();
        document.insert(url, records);
    }
    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HighlightColors, Rgb, Rgba};
    use crate::storage::MemoryStore;
    use serde_json::json;
    use std::time::Duration;

    const URL: &str = "https://example.com/article";

    fn record(address: &str, start: usize, end: usize) -> HighlightRecord {
        HighlightRecord {
            address: address.to_string(),
            start_offset: start,
            end_offset: end,
            colors: HighlightColors {
                background: Rgba(255, 255, 200, 0.5),
                text: Rgb::BLACK,
            },
        }
    }

    #[tokio::test]
    async fn test_get_unknown_page_is_empty() {
        let store = HighlightStore::new(MemoryStore::new());
        assert!(store.get(URL).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_appends_exactly_one() {
        let store = HighlightStore::new(MemoryStore::new());
        store.save(URL, record("/html/body/p[1]", 0, 3)).await.unwrap();
        let before = store.get(URL).await.unwrap().len();

        let saved = record("/html/body/p[2]", 1, 4);
        store.save(URL, saved.clone()).await.unwrap();

        let after = store.get(URL).await.unwrap();
        assert_eq!(after.len(), before + 1);
        assert_eq!(after.last(), Some(&saved));
    }

    #[tokio::test]
    async fn test_pages_are_kept_apart() {
        let store = HighlightStore::new(MemoryStore::new());
        store.save(URL, record("/html/body/p[1]", 0, 3)).await.unwrap();
        store
            .save("https://example.com/other", record("/html/body", 0, 1))
            .await
            .unwrap();

        assert_eq!(store.get(URL).await.unwrap().len(), 1);
        let pages = store.pages().await.unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages.iter().all(|page| page.highlights == 1));
    }

    #[tokio::test]
    async fn test_delete_removes_every_matching_address() {
        let store = HighlightStore::new(MemoryStore::new());
        store.save(URL, record("/html/body/p[2]", 0, 3)).await.unwrap();
        store.save(URL, record("/html/body/p[1]", 0, 3)).await.unwrap();
        store.save(URL, record("/html/body/p[2]", 5, 9)).await.unwrap();

        let removed = store.delete(URL, "/html/body/p[2]").await.unwrap();

        assert_eq!(removed, 2);
        let left = store.get(URL).await.unwrap();
        assert!(left.iter().all(|r| r.address != "/html/body/p[2]"));
        assert_eq!(left.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_on_unknown_page_writes_nothing() {
        let backend = MemoryStore::new();
        let store = HighlightStore::new(backend.clone());

        assert_eq!(store.delete("https://example.com/typo", "/html/body/p[1]").await.unwrap(), 0);
        assert_eq!(store.clear("https://example.com/typo").await.unwrap(), 0);
        assert!(backend.raw(DEFAULT_STORAGE_KEY).await.is_none());

        store.save(URL, record("/html/body/p[1]", 0, 3)).await.unwrap();
        assert_eq!(store.delete("https://example.com/typo", "/html/body/p[1]").await.unwrap(), 0);
        let pages = store.pages().await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].url, URL);
    }

    #[tokio::test]
    async fn test_clear_drops_page() {
        let store = HighlightStore::new(MemoryStore::new());
        store.save(URL, record("/html/body/p[1]", 0, 3)).await.unwrap();
        assert_eq!(store.clear(URL).await.unwrap(), 1);
        assert!(store.get(URL).await.unwrap().is_empty());
        assert!(store.pages().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_document_is_tolerated() {
        let backend = MemoryStore::new();
        backend
            .insert_raw(
                DEFAULT_STORAGE_KEY,
                json!({
                    URL: [
                        { "xpath": "/html/body/p[1]", "startOffset": 0, "endOffset": 2,
                          "colors": { "bg": [255, 255, 200, 0.5], "text": [0, 0, 0] } },
                        { "xpath": 42 },
                        "garbage"
                    ],
                    "https://example.com/broken": "not a list"
                }),
            )
            .await;
        let store = HighlightStore::new(backend.clone());

        let records = store.get(URL).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].address, "/html/body/p[1]");
        assert!(store.get("https://example.com/broken").await.unwrap().is_empty());

        backend.insert_raw(DEFAULT_STORAGE_KEY, json!("nonsense")).await;
        assert!(store.get(URL).await.unwrap().is_empty());
        store.save(URL, record("/html/body", 0, 1)).await.unwrap();
        assert_eq!(store.get(URL).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_custom_key_is_used() {
        let backend = MemoryStore::new();
        let store = HighlightStore::with_key(backend.clone(), "custom");
        store.save(URL, record("/html/body", 0, 1)).await.unwrap();

        assert!(backend.raw("custom").await.is_some());
        assert!(backend.raw(DEFAULT_STORAGE_KEY).await.is_none());
    }

    #[tokio::test]
    async fn test_storage_failure_propagates_to_caller() {
        let backend = MemoryStore::new();
        let store = HighlightStore::new(backend.clone());
        backend.set_failing(true);
        assert!(store.save(URL, record("/html/body", 0, 1)).await.is_err());
        assert!(store.get(URL).await.is_err());
    }

    #[tokio::test]
    async fn test_overlapping_saves_can_lose_an_update() {
        // Both saves read the empty document before either writes, so the second
        // write replaces the first one's addition. This is the known lost update.
        let backend = MemoryStore::new().with_latency(Duration::from_millis(20));
        let store = HighlightStore::new(backend);

        let (first, second) = tokio::join!(
            store.save(URL, record("/html/body/p[1]", 0, 3)),
            store.save(URL, record("/html/body/p[2]", 0, 3)),
        );
        assert!(first.is_ok());
        assert!(second.is_ok());

        let persisted = store.get(URL).await.unwrap();
        assert_eq!(persisted.len(), 1);
    }

    #[tokio::test]
    async fn test_sequential_saves_keep_both() {
        let backend = MemoryStore::new().with_latency(Duration::from_millis(1));
        let store = HighlightStore::new(backend);
        store.save(URL, record("/html/body/p[1]", 0, 3)).await.unwrap();
        store.save(URL, record("/html/body/p[2]", 0, 3)).await.unwrap();
        assert_eq!(store.get(URL).await.unwrap().len(), 2);
    }
}
