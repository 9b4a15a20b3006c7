//! In-memory storage backend

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{Namespace, StorageBackend, StoredRecord};
use crate::error::AgriResult;

/// Volatile backend; contents are lost when the store is dropped
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<(Namespace, String), StoredRecord>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn put(&self, ns: Namespace, key: &str, record: StoredRecord) -> AgriResult<()> {
        self.entries.lock()?.insert((ns, key.to_string()), record);
        Ok(())
    }

    async fn get(&self, ns: Namespace, key: &str) -> AgriResult<Option<StoredRecord>> {
        Ok(self.entries.lock()?.get(&(ns, key.to_string())).cloned())
    }

    async fn delete(&self, ns: Namespace, key: &str) -> AgriResult<()> {
        self.entries.lock()?.remove(&(ns, key.to_string()));
        Ok(())
    }

    async fn delete_if(
        &self,
        ns: Namespace,
        key: &str,
        expected: &StoredRecord,
    ) -> AgriResult<bool> {
        let mut entries = self.entries.lock()?;
        let entry = (ns, key.to_string());
        if entries.get(&entry) != Some(expected) {
            return Ok(false);
        }
        entries.remove(&entry);
        Ok(true)
    }

    async fn keys(&self, ns: Namespace) -> AgriResult<Vec<String>> {
        let entries = self.entries.lock()?;
        let mut keys: Vec<(i64, String)> = entries
            .iter()
            .filter(|((entry_ns, _), _)| *entry_ns == ns)
            .map(|((_, key), record)| (record.timestamp, key.clone()))
            .collect();
        keys.sort();
        Ok(keys.into_iter().map(|(_, key)| key).collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
