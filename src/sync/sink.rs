//! Remote delivery targets for pending operations

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::store::StoredRecord;

/// Trait for remote sync targets
#[async_trait]
pub trait SyncSink: Send + Sync {
    /// Deliver one pending operation; `Ok` means the remote side accepted it
    async fn deliver(&self, key: &str, record: &StoredRecord) -> Result<()>;

    /// Get the sink name
    fn name(&self) -> &str;
}

/// Request body sent to the sync endpoint
#[derive(Debug, Serialize)]
struct SyncPayload<'a> {
    key: &'a str,
    data: &'a serde_json::Value,
    timestamp: i64,
}

/// Sink that POSTs each pending operation as JSON
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpSink {
    /// A request that takes longer than `timeout` counts as a failed delivery
    pub fn new(endpoint: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl SyncSink for HttpSink {
    async fn deliver(&self, key: &str, record: &StoredRecord) -> Result<()> {
        let payload = SyncPayload {
            key,
            data: &record.data,
            timestamp: record.timestamp,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .context("Failed to reach sync endpoint")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("Sync endpoint returned {}", status));
        }

        debug!("Delivered '{}' to {}", key, self.endpoint);
        Ok(())
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Sink that only logs; used when no endpoint is configured
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl SyncSink for LogSink {
    async fn deliver(&self, key: &str, record: &StoredRecord) -> Result<()> {
        info!("📤 Syncing data: {} {}", key, record.data);
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
