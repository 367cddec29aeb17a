//! Append-only intent log
//!
//! The file is a single JSON array of `{query, intents}` records. Every
//! append reads the whole array, pushes one record and rewrites the file
//! through a temp file + rename. Appends to the same path are serialized
//! process-wide.

use crate::error::{Error, Result};
use crate::intent::IntentSet;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tokio::sync::Mutex;
use tracing::debug;

/// One classified query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRecord {
    /// The utterance as classified
    pub query: String,
    /// Codes assigned
    pub intents: IntentSet,
}

/// Destination for intent records
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Append one record
    async fn append(&self, record: IntentRecord) -> Result<()>;

    /// All records, oldest first
    async fn records(&self) -> Result<Vec<IntentRecord>>;
}

/// Write locks keyed by log path
static FILE_LOCKS: LazyLock<DashMap<PathBuf, Arc<Mutex<()>>>> = LazyLock::new(DashMap::new);

/// Resolve `path` against the deepest existing ancestor so every spelling
/// of one file maps to one lock
fn lock_key(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut tail = Vec::new();
    let mut current = absolute.as_path();
    loop {
        if let Ok(real) = std::fs::canonicalize(current) {
            return tail.into_iter().rev().fold(real, |acc, part| acc.join(part));
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                current = parent;
            }
            _ => return absolute,
        }
    }
}

/// JSON-array file log
#[derive(Debug, Clone)]
pub struct JsonFileLog {
    path: PathBuf,
}

impl JsonFileLog {
    /// Log at `path`; the file is created on first append
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the log file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Arc<Mutex<()>> {
        FILE_LOCKS
            .entry(lock_key(&self.path))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Existing entries as raw JSON so foreign fields survive a rewrite
    async fn read_entries(&self) -> Result<Vec<serde_json::Value>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::IntentLog(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text).map_err(|e| {
            Error::IntentLog(format!(
                "{} is not a JSON array: {}",
                self.path.display(),
                e
            ))
        })
    }

    async fn write_entries(&self, entries: &[serde_json::Value]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::IntentLog(format!("failed to create log directory: {}", e)))?;
        }

        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| Error::IntentLog(format!("failed to serialize log: {}", e)))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| Error::IntentLog(format!("failed to write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::IntentLog(format!("failed to replace log: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl LogSink for JsonFileLog {
    async fn append(&self, record: IntentRecord) -> Result<()> {
        let lock = self.lock();
        let _guard = lock.lock().await;

        let mut entries = self.read_entries().await?;
        let value = serde_json::to_value(&record)
            .map_err(|e| Error::IntentLog(format!("failed to serialize record: {}", e)))?;
        entries.push(value);
        self.write_entries(&entries).await?;

        debug!(path = %self.path.display(), total = entries.len(), "Intent record appended");
        Ok(())
    }

    async fn records(&self) -> Result<Vec<IntentRecord>> {
        let lock = self.lock();
        let _guard = lock.lock().await;

        self.read_entries()
            .await?
            .into_iter()
            .map(|v| {
                serde_json::from_value(v)
                    .map_err(|e| Error::IntentLog(format!("malformed record: {}", e)))
            })
            .collect()
    }
}

/// In-memory log for tests and log-less runs
#[derive(Debug, Default)]
pub struct MemoryLog {
    records: Mutex<Vec<IntentRecord>>,
}

impl MemoryLog {
    /// Empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogSink for MemoryLog {
    async fn append(&self, record: IntentRecord) -> Result<()> {
        self.records.lock().await.push(record);
        Ok(())
    }

    async fn records(&self) -> Result<Vec<IntentRecord>> {
        Ok(self.records.lock().await.clone())
    }
}
