//! Durable key-value backends.
//!
//! The highlight engine only ever sees [`DurableStore`]: an asynchronous map that
//! reads a set of keys and merges a partial map back. Nothing here enforces a schema;
//! callers must tolerate whatever a previous writer left behind.
//!
//! # Backends
//!
//! - [`MemoryStore`]: process-local, with injectable latency and failures for tests
//! - [`JsonFileStore`]: one JSON object on disk
//! - [`LibsqlStore`]: a `kv` table in a local libsql database

mod file;
mod libsql_kv;
mod memory;

pub use file::JsonFileStore;
pub use libsql_kv::LibsqlStore;
pub use memory::MemoryStore;

use serde_json::{Map, Value};

use crate::config::{Backend, StorageSettings};
use crate::error::StorageError;

pub type StorageResult<T> = Result<T, StorageError>;

/// An asynchronous, schema-less key-value service.
#[allow(async_fn_in_trait)]
pub trait DurableStore {
    /// Returns the stored values for `keys`; missing keys are simply absent.
    async fn get(&self, keys: &[&str]) -> StorageResult<Map<String, Value>>;

    /// Writes every entry of `items`, leaving other keys alone.
    async fn set(&self, items: Map<String, Value>) -> StorageResult<()>;
}

/// The backend selected in configuration.
pub enum ConfiguredStore {
    Memory(MemoryStore),
    File(JsonFileStore),
    Libsql(LibsqlStore),
}

impl ConfiguredStore {
    pub async fn open(settings: &StorageSettings) -> StorageResult<Self> {
        let store = match settings.backend {
            Backend::Memory => ConfiguredStore::Memory(MemoryStore::new()),
            Backend::File => ConfiguredStore::File(JsonFileStore::new(&settings.path)),
            Backend::Libsql => ConfiguredStore::Libsql(LibsqlStore::open(&settings.path).await?),
        };
        Ok(store)
    }
}

impl DurableStore for ConfiguredStore {
    async fn get(&self, keys: &[&str]) -> StorageResult<Map<String, Value>> {
        match self {
            ConfiguredStore::Memory(store) => store.get(keys).await,
            ConfiguredStore::File(store) => store.get(keys).await,
            ConfiguredStore::Libsql(store) => store.get(keys).await,
        }
    }

    async fn set(&self, items: Map<String, Value>) -> StorageResult<()> {
        match self {
            ConfiguredStore::Memory(store) => store.set(items).await,
            ConfiguredStore::File(store) => store.set(items).await,
            ConfiguredStore::Libsql(store) => store.set(items).await,
        }
    }
}
