//! Offline Store
//!
//! Durable key/value storage with timestamped envelopes. Two logical
//! namespaces share one backend: the ordinary cache and the queue of
//! pending writes waiting for the sync coordinator.
//!
//! Local I/O failures never reach callers. They are logged and the operation
//! degrades to a no-op or an absent value, so offline flows never block on
//! storage faults.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::AgriResult;

/// Logical namespace of a stored entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Ordinary cached domain data
    Cache,
    /// Local writes not yet delivered to the remote side
    Pending,
}

impl Namespace {
    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Cache => "cache",
            Namespace::Pending => "pending",
        }
    }
}

/// Persisted record envelope: `{ "data": .., "timestamp": <epoch-ms> }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub data: serde_json::Value,
    pub timestamp: i64,
}

impl StoredRecord {
    pub fn now(data: serde_json::Value) -> Self {
        Self {
            data,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Trait for storage backends
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Insert or overwrite the record under `key`
    async fn put(&self, ns: Namespace, key: &str, record: StoredRecord) -> AgriResult<()>;

    async fn get(&self, ns: Namespace, key: &str) -> AgriResult<Option<StoredRecord>>;

    /// Delete `key`; deleting an absent key is not an error
    async fn delete(&self, ns: Namespace, key: &str) -> AgriResult<()>;

    /// Delete `key` only while it still holds `expected`. Returns whether a
    /// row was removed.
    async fn delete_if(&self, ns: Namespace, key: &str, expected: &StoredRecord)
        -> AgriResult<bool>;

    /// Keys of a namespace, oldest record first, key as tiebreaker
    async fn keys(&self, ns: Namespace) -> AgriResult<Vec<String>>;

    /// Get the backend name
    fn name(&self) -> &str;
}

/// Offline-first store shared by the UI collaborators and the sync coordinator
#[derive(Clone)]
pub struct OfflineStore {
    backend: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for OfflineStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineStore")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl OfflineStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        info!("💾 Offline store ready ({})", backend.name());
        Self { backend }
    }

    /// In-memory store for tests and throwaway sessions
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Store `payload` under `key`, overwriting any prior value
    pub async fn write<T: Serialize>(&self, key: &str, payload: &T) {
        self.put(Namespace::Cache, key, payload).await;
    }

    /// The payload stored under `key`, or `None` if absent or unreadable
    pub async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(Namespace::Cache, key).await
    }

    /// The full envelope stored under `key`, including its timestamp
    pub async fn read_record(&self, key: &str) -> Option<StoredRecord> {
        self.get_record(Namespace::Cache, key).await
    }

    pub async fn remove(&self, key: &str) {
        self.delete(Namespace::Cache, key).await;
    }

    pub async fn list_keys(&self) -> Vec<String> {
        self.keys(Namespace::Cache).await
    }

    /// Queue a local write for delivery on the next connectivity regain
    pub async fn queue_pending<T: Serialize>(&self, key: &str, payload: &T) {
        self.put(Namespace::Pending, key, payload).await;
    }

    pub async fn read_pending(&self, key: &str) -> Option<StoredRecord> {
        self.get_record(Namespace::Pending, key).await
    }

    /// Pending keys in drain order
    pub async fn pending_keys(&self) -> Vec<String> {
        self.keys(Namespace::Pending).await
    }

    /// Explicitly abandon a pending operation
    pub async fn discard_pending(&self, key: &str) {
        self.delete(Namespace::Pending, key).await;
    }

    /// Remove a delivered pending operation unless it was queued again while
    /// in flight. Returns `false` when a newer version is still waiting.
    pub async fn settle_pending(&self, key: &str, delivered: &StoredRecord) -> bool {
        match self.backend.delete_if(Namespace::Pending, key, delivered).await {
            Ok(removed) => removed,
            Err(e) => {
                error!("Failed to remove synced entry '{}': {}", key, e);
                false
            }
        }
    }

    /// Move cache entries that use the old `pending_` key convention into
    /// the pending namespace. Returns the number of entries moved.
    pub async fn migrate_legacy_pending(&self, prefix: &str) -> usize {
        if prefix.is_empty() {
            return 0;
        }

        let mut moved = 0;
        for key in self.list_keys().await {
            let Some(stripped) = key.strip_prefix(prefix) else {
                continue;
            };
            if stripped.is_empty() {
                continue;
            }
            let Some(record) = self.get_record(Namespace::Cache, &key).await else {
                continue;
            };
            match self.backend.get(Namespace::Pending, stripped).await {
                Ok(None) => {}
                Ok(Some(_)) => {
                    warn!(
                        "⚠️ Pending entry '{}' already exists, keeping legacy '{}' in place",
                        stripped, key
                    );
                    continue;
                }
                Err(e) => {
                    error!("Failed to check pending entry '{}': {}", stripped, e);
                    continue;
                }
            }

            // Copy first so a failure in between leaves a duplicate, never a loss
            if let Err(e) = self
                .backend
                .put(Namespace::Pending, stripped, record)
                .await
            {
                error!("Failed to migrate pending entry '{}': {}", key, e);
                continue;
            }
            self.delete(Namespace::Cache, &key).await;
            moved += 1;
        }

        if moved > 0 {
            info!("📦 Migrated {} legacy pending entries", moved);
        }
        moved
    }

    async fn put<T: Serialize>(&self, ns: Namespace, key: &str, payload: &T) {
        let data = match serde_json::to_value(payload) {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to encode offline data for '{}': {}", key, e);
                return;
            }
        };

        if let Err(e) = self.backend.put(ns, key, StoredRecord::now(data)).await {
            error!("Failed to store offline data '{}': {}", key, e);
        } else {
            debug!("Stored {}:{}", ns.as_str(), key);
        }
    }

    async fn get<T: DeserializeOwned>(&self, ns: Namespace, key: &str) -> Option<T> {
        let record = self.get_record(ns, key).await?;
        match serde_json::from_value(record.data) {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!("Offline data for '{}' has unexpected shape: {}", key, e);
                None
            }
        }
    }

    async fn get_record(&self, ns: Namespace, key: &str) -> Option<StoredRecord> {
        match self.backend.get(ns, key).await {
            Ok(record) => record,
            Err(e) => {
                error!("Failed to retrieve offline data '{}': {}", key, e);
                None
            }
        }
    }

    async fn delete(&self, ns: Namespace, key: &str) {
        if let Err(e) = self.backend.delete(ns, key).await {
            error!("Failed to remove offline data '{}': {}", key, e);
        }
    }

    async fn keys(&self, ns: Namespace) -> Vec<String> {
        match self.backend.keys(ns).await {
            Ok(keys) => keys,
            Err(e) => {
                error!("Failed to get offline keys: {}", e);
                Vec::new()
            }
        }
    }
}
