#![allow(dead_code)]

pub mod mock_asr;
pub mod mock_tts;

use agrivoice::store::{OfflineStore, StoredRecord};
use agrivoice::sync::SyncSink;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

/// Sync sink that records deliveries and can be told to reject keys
pub struct RecordingSink {
    store: OfflineStore,
    pub delivered: Mutex<Vec<String>>,
    /// For each call: was the entry still pending when delivery started
    pub pending_at_delivery: Mutex<Vec<(String, bool)>>,
    pub reject: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new(store: OfflineStore) -> Self {
        Self {
            store,
            delivered: Mutex::new(Vec::new()),
            pending_at_delivery: Mutex::new(Vec::new()),
            reject: Mutex::new(Vec::new()),
        }
    }

    pub fn reject(&self, key: &str) {
        self.reject.lock().unwrap().push(key.to_string());
    }

    pub fn accept_all(&self) {
        self.reject.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<String> {
        self.pending_at_delivery
            .lock()
            .unwrap()
            .iter()
            .map(|(k, _)| k.clone())
            .collect()
    }
}

#[async_trait]
impl SyncSink for RecordingSink {
    async fn deliver(&self, key: &str, _record: &StoredRecord) -> anyhow::Result<()> {
        let still_pending = self.store.read_pending(key).await.is_some();
        self.pending_at_delivery
            .lock()
            .unwrap()
            .push((key.to_string(), still_pending));

        if self.reject.lock().unwrap().iter().any(|k| k == key) {
            anyhow::bail!("remote rejected {}", key);
        }
        self.delivered.lock().unwrap().push(key.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Poll `condition` until it holds, failing the test after five seconds
pub async fn eventually<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met within 5s");
}
