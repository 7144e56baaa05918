//! Cache index and its persisted form.
//!
//! The index of a namespace is stored as one JSON object under the settings
//! key `{index_key_prefix}{namespace}`, keyed by owner id:
//!
//! ```json
//! {
//!   "g1": {
//!     "localPath": "/cache/floor_music/hub-1-695387d2db6a18dc/g1-711430f6164e9380/Floor.mp3",
//!     "remoteUrl": "https://cdn.example.com/g1.mp3",
//!     "fileName": "Floor.mp3",
//!     "fileSize": 4194304,
//!     "downloadedAt": "2024-03-01T10:00:00Z"
//!   }
//! }
//! ```

use crate::error::Result;
use bridge_traits::storage::SettingsStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// One cached file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedFileRecord {
    /// Owner the file belongs to. Persisted as the map key.
    #[serde(skip)]
    pub owner_id: String,
    pub local_path: PathBuf,
    /// Remote URL captured at download time
    pub remote_url: String,
    /// Original display name
    pub file_name: String,
    /// Bytes, measured after the download completed
    pub file_size: u64,
    pub downloaded_at: DateTime<Utc>,
}

impl CachedFileRecord {
    /// A record is valid only while the owner's current URL matches the stored one.
    pub fn is_valid_for(&self, current_remote_url: &str) -> bool {
        self.remote_url == current_remote_url
    }
}

/// In-memory map of `owner_id -> CachedFileRecord`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheIndex {
    records: HashMap<String, CachedFileRecord>,
}

impl CacheIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, owner_id: &str) -> Option<&CachedFileRecord> {
        self.records.get(owner_id)
    }

    /// Insert or replace a record, returning the one it replaced.
    pub fn insert(&mut self, record: CachedFileRecord) -> Option<CachedFileRecord> {
        self.records.insert(record.owner_id.clone(), record)
    }

    pub fn remove(&mut self, owner_id: &str) -> Option<CachedFileRecord> {
        self.records.remove(owner_id)
    }

    pub fn records(&self) -> impl Iterator<Item = &CachedFileRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `true` iff a record exists for `owner_id` and matches `current_remote_url`.
    pub fn is_valid_for(&self, owner_id: &str, current_remote_url: &str) -> bool {
        self.records
            .get(owner_id)
            .is_some_and(|record| record.is_valid_for(current_remote_url))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let mut records: HashMap<String, CachedFileRecord> = serde_json::from_str(json)?;
        for (owner_id, record) in records.iter_mut() {
            record.owner_id = owner_id.clone();
        }
        Ok(Self { records })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.records)?)
    }
}

/// Typed wrapper over the host settings store.
#[derive(Clone)]
pub struct PersistentIndex {
    settings: Arc<dyn SettingsStore>,
    key_prefix: String,
}

impl PersistentIndex {
    pub fn new(settings: Arc<dyn SettingsStore>, key_prefix: impl Into<String>) -> Self {
        Self {
            settings,
            key_prefix: key_prefix.into(),
        }
    }

    fn key(&self, namespace: &str) -> String {
        format!("{}{}", self.key_prefix, namespace)
    }

    /// Load a namespace's index.
    ///
    /// Never fails: unreadable storage yields an empty index, and unparseable
    /// data yields an empty index after the corrupt key is deleted.
    pub async fn load(&self, namespace: &str) -> CacheIndex {
        let key = self.key(namespace);

        let raw = match self.settings.get_string(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return CacheIndex::new(),
            Err(e) => {
                warn!(namespace, error = %e, "Failed to read persisted cache index");
                return CacheIndex::new();
            }
        };

        match CacheIndex::from_json(&raw) {
            Ok(index) => {
                debug!(namespace, records = index.len(), "Loaded persisted cache index");
                index
            }
            Err(e) => {
                warn!(namespace, error = %e, "Discarding corrupt cache index");
                if let Err(e) = self.settings.delete(&key).await {
                    warn!(namespace, error = %e, "Failed to delete corrupt cache index");
                }
                CacheIndex::new()
            }
        }
    }

    /// Replace the persisted index of a namespace with `index`.
    pub async fn save(&self, namespace: &str, index: &CacheIndex) -> Result<()> {
        let json = index.to_json()?;
        self.settings.set_string(&self.key(namespace), &json).await?;
        Ok(())
    }
}
