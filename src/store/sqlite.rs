//! SQLite storage backend

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;

use super::{Namespace, StorageBackend, StoredRecord};
use crate::error::{AgriError, AgriResult};

/// Durable backend storing every envelope as a JSON row
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("path", &self.path)
            .finish()
    }
}

impl SqliteBackend {
    pub fn open(path: impl AsRef<Path>) -> AgriResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;
        init_db(&conn)?;
        info!("Opened offline database at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a blocking database call off the async runtime
    async fn with_conn<T, F>(&self, f: F) -> AgriResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> AgriResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock()?;
            f(&conn)
        })
        .await
        .map_err(|e| AgriError::Storage(format!("Task join error: {}", e)))?
    }
}

fn init_db(conn: &Connection) -> AgriResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS entries (
            namespace TEXT NOT NULL,
            key TEXT NOT NULL,
            data TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            PRIMARY KEY (namespace, key)
        )",
        [],
    )?;
    Ok(())
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    async fn put(&self, ns: Namespace, key: &str, record: StoredRecord) -> AgriResult<()> {
        let key = key.to_string();
        let data = serde_json::to_string(&record.data)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO entries (namespace, key, data, timestamp)
                 VALUES (?1, ?2, ?3, ?4)",
                params![ns.as_str(), key, data, record.timestamp],
            )?;
            Ok(())
        })
        .await
    }

    async fn get(&self, ns: Namespace, key: &str) -> AgriResult<Option<StoredRecord>> {
        let key = key.to_string();
        let row = self
            .with_conn(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT data, timestamp FROM entries WHERE namespace = ?1 AND key = ?2",
                        params![ns.as_str(), key],
                        |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;

        match row {
            Some((data, timestamp)) => Ok(Some(StoredRecord {
                data: serde_json::from_str(&data)?,
                timestamp,
            })),
            None => Ok(None),
        }
    }

    async fn delete(&self, ns: Namespace, key: &str) -> AgriResult<()> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM entries WHERE namespace = ?1 AND key = ?2",
                params![ns.as_str(), key],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete_if(
        &self,
        ns: Namespace,
        key: &str,
        expected: &StoredRecord,
    ) -> AgriResult<bool> {
        let key = key.to_string();
        let data = serde_json::to_string(&expected.data)?;
        let timestamp = expected.timestamp;
        self.with_conn(move |conn| {
            let removed = conn.execute(
                "DELETE FROM entries
                 WHERE namespace = ?1 AND key = ?2 AND data = ?3 AND timestamp = ?4",
                params![ns.as_str(), key, data, timestamp],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    async fn keys(&self, ns: Namespace) -> AgriResult<Vec<String>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT key FROM entries WHERE namespace = ?1 ORDER BY timestamp, key",
            )?;
            let keys = stmt
                .query_map(params![ns.as_str()], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(keys)
        })
        .await
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
