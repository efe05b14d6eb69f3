//! JSON-file collection wrapper
//!
//! A collection is one file holding a list of records. The whole list is
//! cached in memory behind a `RwLock`; every mutation works on a copy, is
//! persisted, and only then replaces the cached list, so a failed write
//! leaves both disk and memory unchanged.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::db::storage::Storage;
use crate::types::ArchiveError;

/// Records kept in a collection.
pub trait StoredRecord: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Normalized id used for lookups
    fn key(&self) -> String;

    /// Rewrite legacy or non-canonical values in place. Returns true when
    /// anything changed.
    fn canonicalize(&mut self) -> bool {
        false
    }
}

/// Typed wrapper over one collection file
pub struct JsonCollection<T> {
    name: &'static str,
    storage: Arc<dyn Storage>,
    items: RwLock<Vec<T>>,
}

impl<T: StoredRecord> JsonCollection<T> {
    /// Load a collection, creating an empty file if none exists.
    ///
    /// Accepts a bare array, a `{"results": [...]}` wrapper or an object of
    /// records keyed by id. Records are canonicalized on load; the file itself
    /// is rewritten on the next mutation.
    pub async fn load(name: &'static str, storage: Arc<dyn Storage>) -> Result<Self, ArchiveError> {
        let (items, changed) = match storage.read(name).await? {
            Some(raw) => decode::<T>(name, &raw)?,
            None => {
                storage.write(name, "[]").await?;
                (Vec::new(), 0)
            }
        };

        if changed > 0 {
            warn!(
                "{}: {} record(s) carry non-canonical values, normalized in memory",
                name, changed
            );
        }
        info!("Loaded {} record(s) from {}", items.len(), name);

        Ok(Self {
            name,
            storage,
            items: RwLock::new(items),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Copy of every record
    pub async fn all(&self) -> Vec<T> {
        self.items.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Find a record by id (normalized: "007" and "7" match)
    pub async fn get(&self, id: &str) -> Option<T> {
        let key = super::normalize_id(id);
        self.items
            .read()
            .await
            .iter()
            .find(|r| r.key() == key)
            .cloned()
    }

    /// Apply a mutation to a working copy, persist it, then publish it.
    pub async fn update<R, F>(&self, f: F) -> Result<R, ArchiveError>
    where
        F: FnOnce(&mut Vec<T>) -> Result<R, ArchiveError>,
    {
        let mut guard = self.items.write().await;
        let mut working = guard.clone();
        let out = f(&mut working)?;
        self.persist(&working).await?;
        *guard = working;
        Ok(out)
    }

    /// Write the cached list back in canonical form.
    pub async fn flush(&self) -> Result<(), ArchiveError> {
        let guard = self.items.read().await;
        self.persist(&guard).await
    }

    async fn persist(&self, items: &[T]) -> Result<(), ArchiveError> {
        let body = serde_json::to_string_pretty(items)
            .map_err(|e| ArchiveError::Internal(format!("Failed to encode {}: {}", self.name, e)))?;
        self.storage.write(self.name, &body).await
    }
}

/// Decode a collection file. Returns the records and how many of them were
/// changed by canonicalization.
pub fn decode<T: StoredRecord>(name: &str, raw: &str) -> Result<(Vec<T>, usize), ArchiveError> {
    if raw.trim().is_empty() {
        return Ok((Vec::new(), 0));
    }

    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ArchiveError::Storage(format!("{} is not valid JSON: {}", name, e)))?;

    let entries = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                map.insert("results".to_string(), other);
                map.into_iter().map(|(_, v)| v).collect()
            }
            None => map.into_iter().map(|(_, v)| v).collect(),
        },
        _ => {
            return Err(ArchiveError::Storage(format!(
                "{} must hold a list of records",
                name
            )))
        }
    };

    let mut changed = 0;
    let mut items = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.into_iter().enumerate() {
        let mut record: T = serde_json::from_value(entry).map_err(|e| {
            ArchiveError::Storage(format!("{}: record {} is malformed: {}", name, idx, e))
        })?;
        if record.canonicalize() {
            changed += 1;
        }
        items.push(record);
    }

    Ok((items, changed))
}
