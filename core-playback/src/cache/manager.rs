//! # Offline Cache Manager
//!
//! Downloads floor music for offline use and keeps the per-namespace index
//! consistent with the file system and with the caller's notion of each
//! owner's current remote file.
//!
//! - Downloads stream into a `.part` file next to the final path and are
//!   renamed into place only after the new index has been persisted, so a
//!   failed download never clobbers a previously valid record.
//! - A partial file is removed when its download fails or its future is
//!   dropped. Whatever a crash leaves behind is swept by `initialize`.
//! - Index mutations are serialized by a write lock; readers never wait on I/O.
//! - A second download for an owner that is already in flight is rejected.
//! - Bulk downloads are sequential and cooperatively cancellable.
//!
//! Public operations absorb errors into `bool`/unit results and a log line.

use crate::cache::{
    config::CacheConfig,
    index::{CacheIndex, CachedFileRecord, PersistentIndex},
    paths,
    stats::{CacheStats, DownloadProgress},
    store::FileStore,
};
use crate::error::{PlaybackError, Result};
use bridge_traits::{
    http::HttpClient,
    storage::{FileSystemAccess, SettingsStore},
    time::{Clock, SystemClock},
};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use core_runtime::logging::{redact_url, strip_path};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Snapshot of every in-flight download, keyed by owner id.
pub type ProgressMap = HashMap<String, DownloadProgress>;

/// One entry of a bulk download request.
///
/// The backend is the source of truth for each owner's current file, so the
/// caller supplies the remote URL and display name with every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadItem {
    pub owner_id: String,
    pub remote_url: String,
    pub display_name: String,
}

impl DownloadItem {
    pub fn new(
        owner_id: impl Into<String>,
        remote_url: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            remote_url: remote_url.into(),
            display_name: display_name.into(),
        }
    }
}

/// Outcome of [`OfflineCacheManager::download_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkDownloadReport {
    /// Items that are cached when the loop ends, including ones that already were
    pub downloaded: usize,
    pub failed: usize,
    /// The loop stopped early because its token was cancelled
    pub cancelled: bool,
}

struct CacheState {
    namespace: String,
    root: PathBuf,
    index: CacheIndex,
}

/// Offline cache manager for one active namespace (hub).
pub struct OfflineCacheManager {
    config: CacheConfig,
    store: FileStore,
    persistent: PersistentIndex,
    clock: Arc<dyn Clock>,
    event_bus: Option<Arc<EventBus>>,
    state: RwLock<Option<CacheState>>,
    write_lock: tokio::sync::Mutex<()>,
    progress: watch::Sender<ProgressMap>,
    bulk_in_progress: watch::Sender<bool>,
    bulk_tokens: Mutex<Vec<(u64, CancellationToken)>>,
    next_bulk_id: AtomicU64,
}

impl OfflineCacheManager {
    /// Create a new offline cache manager.
    ///
    /// Nothing is read until [`initialize`](Self::initialize) is called.
    pub fn new(
        config: CacheConfig,
        fs: Arc<dyn FileSystemAccess>,
        http_client: Arc<dyn HttpClient>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        let store = FileStore::new(fs, http_client, config.copy_buffer_size);
        let persistent = PersistentIndex::new(settings, config.index_key_prefix.clone());

        Self {
            config,
            store,
            persistent,
            clock: Arc::new(SystemClock),
            event_bus: None,
            state: RwLock::new(None),
            write_lock: tokio::sync::Mutex::new(()),
            progress: watch::channel(ProgressMap::new()).0,
            bulk_in_progress: watch::channel(false).0,
            bulk_tokens: Mutex::new(Vec::new()),
            next_bulk_id: AtomicU64::new(0),
        }
    }

    /// Set event bus for cache events.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Set the clock used to stamp records.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Load the persisted index for `namespace`, prune records whose file
    /// no longer exists, and sweep stale partial files when no download runs.
    ///
    /// Calling again with the active namespace is a no-op; a different
    /// namespace replaces the active one. Corrupt or unreadable persisted
    /// data yields an empty index.
    ///
    /// # Errors
    ///
    /// Only when the configuration is invalid or the host cache directory
    /// cannot be resolved.
    #[instrument(skip(self))]
    pub async fn initialize(&self, namespace: &str) -> Result<()> {
        let _write = self.write_lock.lock().await;

        if self.namespace().as_deref() == Some(namespace) {
            debug!("Offline cache already initialized");
            return Ok(());
        }

        self.config.validate().map_err(|e| {
            PlaybackError::CacheError(format!("Invalid cache configuration: {}", e))
        })?;

        let cache_root = self.store.cache_root().await?;
        let root = paths::namespace_dir(&cache_root, &self.config.cache_directory, namespace);

        let mut index = self.persistent.load(namespace).await;

        let mut missing = Vec::new();
        for record in index.records() {
            if !self.store.exists(&record.local_path).await {
                missing.push(record.owner_id.clone());
            }
        }

        if !missing.is_empty() {
            for owner_id in &missing {
                index.remove(owner_id);
            }
            info!(pruned = missing.len(), "Pruned cache records with missing files");
            if let Err(e) = self.persistent.save(namespace, &index).await {
                warn!(error = %e, "Failed to persist pruned cache index");
            }
        }

        let idle = self.progress.borrow().is_empty();
        if idle {
            self.sweep_partial_files(&root).await;
        } else {
            debug!("Downloads in flight, leaving partial files alone");
        }

        info!(records = index.len(), "Offline cache initialized");
        *self.state.write() = Some(CacheState {
            namespace: namespace.to_string(),
            root,
            index,
        });

        Ok(())
    }

    /// Delete partial files left by downloads that never settled, at the
    /// namespace root and one owner directory below it.
    async fn sweep_partial_files(&self, root: &Path) {
        let mut dirs = vec![root.to_path_buf()];
        let mut swept = 0usize;

        while let Some(dir) = dirs.pop() {
            let entries = match self.store.list(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(error = %e, "Could not list cache directory");
                    continue;
                }
            };

            for entry in entries {
                if paths::is_partial(&entry) {
                    match self.store.delete(&entry).await {
                        Ok(()) => swept += 1,
                        Err(e) => warn!(error = %e, "Failed to remove stale partial download"),
                    }
                } else if dir == root {
                    dirs.push(entry);
                }
            }
        }

        if swept > 0 {
            info!(swept, "Removed stale partial downloads");
        }
    }

    /// Active namespace, if initialized.
    pub fn namespace(&self) -> Option<String> {
        self.state.read().as_ref().map(|s| s.namespace.clone())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// `true` iff a record exists for `owner_id` and was downloaded from
    /// `current_remote_url`.
    pub fn is_cached(&self, owner_id: &str, current_remote_url: &str) -> bool {
        self.state
            .read()
            .as_ref()
            .is_some_and(|s| s.index.is_valid_for(owner_id, current_remote_url))
    }

    /// Local path to play for `owner_id`, or `None` on a cache miss.
    pub fn resolve_playable_uri(&self, owner_id: &str, current_remote_url: &str) -> Option<PathBuf> {
        let state = self.state.read();
        let record = state.as_ref()?.index.get(owner_id)?;
        record
            .is_valid_for(current_remote_url)
            .then(|| record.local_path.clone())
    }

    /// Every cached record of the active namespace, ordered by owner id.
    pub fn list_cached(&self) -> Vec<CachedFileRecord> {
        let mut records: Vec<_> = self
            .state
            .read()
            .as_ref()
            .map(|s| s.index.records().cloned().collect())
            .unwrap_or_default();
        records.sort_by(|a, b| a.owner_id.cmp(&b.owner_id));
        records
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.read();
        let Some(state) = state.as_ref() else {
            return CacheStats::default();
        };
        CacheStats {
            cached_files: state.index.len(),
            total_bytes: state.index.records().map(|r| r.file_size).sum(),
        }
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    /// Observe in-flight downloads. An owner is present only while its
    /// download runs.
    pub fn subscribe_progress(&self) -> watch::Receiver<ProgressMap> {
        self.progress.subscribe()
    }

    /// Observe whether any bulk download is running.
    pub fn subscribe_bulk_in_progress(&self) -> watch::Receiver<bool> {
        self.bulk_in_progress.subscribe()
    }

    pub fn download_progress(&self, owner_id: &str) -> Option<DownloadProgress> {
        self.progress.borrow().get(owner_id).copied()
    }

    pub fn is_downloading(&self, owner_id: &str) -> bool {
        self.progress.borrow().contains_key(owner_id)
    }

    pub fn is_bulk_in_progress(&self) -> bool {
        *self.bulk_in_progress.borrow()
    }

    // ------------------------------------------------------------------
    // Downloads
    // ------------------------------------------------------------------

    /// Download one owner's file, replacing any previous record on success.
    ///
    /// Returns `false` when the cache is not initialized, when a download for
    /// the same owner is already running, or when any step fails. A failure
    /// leaves the index and any previously cached file untouched.
    #[instrument(skip(self, remote_url, display_name))]
    pub async fn download_one(&self, owner_id: &str, remote_url: &str, display_name: &str) -> bool {
        let (namespace, root) = match self.location() {
            Ok(location) => location,
            Err(e) => {
                warn!(error = %e, "Download rejected");
                return false;
            }
        };

        let Some(_in_flight) = InFlightGuard::acquire(&self.progress, owner_id) else {
            warn!("Download already in progress, rejecting duplicate request");
            return false;
        };
        self.emit(CacheEvent::DownloadStarted {
            owner_id: owner_id.to_string(),
        });

        let final_path = paths::cached_file_path(&root, owner_id, display_name, remote_url);
        let target = DownloadTarget {
            namespace,
            part_path: paths::partial_path(&final_path),
            final_path,
        };
        let partial = PartialFile::new(self.store.clone(), target.part_path.clone());

        let result = self
            .fetch_and_commit(&target, owner_id, remote_url, display_name)
            .await;

        match result {
            Ok(record) => {
                partial.settle();
                info!(
                    file = %strip_path(&record.local_path.to_string_lossy()),
                    bytes = record.file_size,
                    "Cached floor music"
                );
                self.emit(CacheEvent::DownloadCompleted {
                    owner_id: owner_id.to_string(),
                    file_size: record.file_size,
                });
                true
            }
            Err(e) => {
                if let Err(cleanup) = self.store.delete(&target.part_path).await {
                    warn!(error = %cleanup, "Failed to remove partial download");
                }
                partial.settle();
                warn!(
                    remote_url = %redact_url(remote_url),
                    error = %e,
                    "Download failed"
                );
                self.emit(CacheEvent::DownloadFailed {
                    owner_id: owner_id.to_string(),
                    message: e.to_string(),
                });
                false
            }
        }
    }

    async fn fetch_and_commit(
        &self,
        target: &DownloadTarget,
        owner_id: &str,
        remote_url: &str,
        display_name: &str,
    ) -> Result<CachedFileRecord> {
        if let Some(dir) = target.final_path.parent() {
            self.store.make_dir(dir).await?;
        }

        let mut last_percent = 0u8;
        let written = self
            .store
            .download(remote_url, &target.part_path, |progress| {
                self.report_progress(owner_id, progress, &mut last_percent)
            })
            .await
            .map_err(|e| PlaybackError::DownloadFailed {
                owner_id: owner_id.to_string(),
                reason: e.to_string(),
            })?;

        let file_size = match self.store.size(&target.part_path).await {
            Ok(size) => size,
            Err(e) => {
                debug!(error = %e, "Could not measure download, using bytes written");
                written
            }
        };

        let record = CachedFileRecord {
            owner_id: owner_id.to_string(),
            local_path: target.final_path.clone(),
            remote_url: remote_url.to_string(),
            file_name: display_name.to_string(),
            file_size,
            downloaded_at: self.clock.now(),
        };

        self.commit(&target.namespace, &target.part_path, record).await
    }

    /// Persist the new index, move the download into place, then publish.
    async fn commit(
        &self,
        namespace: &str,
        part_path: &Path,
        record: CachedFileRecord,
    ) -> Result<CachedFileRecord> {
        let _write = self.write_lock.lock().await;

        let (current, mut next) = {
            let state = self.state.read();
            match state.as_ref() {
                Some(s) if s.namespace == namespace => (s.index.clone(), s.index.clone()),
                _ => {
                    return Err(PlaybackError::CacheError(
                        "Namespace changed while the download was running".to_string(),
                    ))
                }
            }
        };

        let previous = next.insert(record.clone());
        self.persistent.save(namespace, &next).await?;

        if let Err(e) = self.store.rename(part_path, &record.local_path).await {
            if let Err(rollback) = self.persistent.save(namespace, &current).await {
                warn!(error = %rollback, "Failed to roll back persisted cache index");
            }
            return Err(e);
        }

        if let Some(state) = self.state.write().as_mut() {
            state.index = next;
        }

        if let Some(previous) = previous {
            if previous.local_path != record.local_path {
                if let Err(e) = self.store.delete(&previous.local_path).await {
                    warn!(error = %e, "Failed to delete superseded cached file");
                }
            }
        }

        Ok(record)
    }

    fn report_progress(&self, owner_id: &str, progress: DownloadProgress, last_percent: &mut u8) {
        self.progress.send_if_modified(|map| match map.get_mut(owner_id) {
            Some(current) if *current != progress => {
                *current = progress;
                true
            }
            _ => false,
        });

        let fraction = progress.fraction();
        let percent = (fraction * 100.0) as u8;
        if percent > *last_percent {
            *last_percent = percent;
            self.emit(CacheEvent::DownloadProgress {
                owner_id: owner_id.to_string(),
                fraction,
            });
        }
    }

    /// Download every item in order, one at a time.
    ///
    /// `cancel` is checked before each item; once cancelled no further item
    /// starts and unprocessed items are not counted. Items already cached for
    /// their current URL count as downloaded without touching the network.
    #[instrument(skip(self, items, cancel), fields(total = items.len()))]
    pub async fn download_all(
        &self,
        items: &[DownloadItem],
        cancel: CancellationToken,
    ) -> BulkDownloadReport {
        let _bulk = BulkGuard::register(self, cancel.clone());
        self.emit(CacheEvent::BulkStarted { total: items.len() });

        let mut report = BulkDownloadReport::default();
        for item in items {
            if cancel.is_cancelled() {
                report.cancelled = true;
                info!("Bulk download cancelled");
                break;
            }

            if self.is_cached(&item.owner_id, &item.remote_url) {
                debug!(owner_id = %item.owner_id, "Already cached, skipping");
                report.downloaded += 1;
                continue;
            }

            if self
                .download_one(&item.owner_id, &item.remote_url, &item.display_name)
                .await
            {
                report.downloaded += 1;
            } else {
                report.failed += 1;
            }
        }

        info!(
            downloaded = report.downloaded,
            failed = report.failed,
            "Bulk download finished"
        );
        self.emit(CacheEvent::BulkFinished {
            downloaded: report.downloaded,
            failed: report.failed,
            cancelled: report.cancelled,
        });
        report
    }

    /// Cancel every running bulk download. The item in flight finishes.
    pub fn cancel_bulk_download(&self) {
        let tokens = self.bulk_tokens.lock();
        if tokens.is_empty() {
            debug!("No bulk download to cancel");
        }
        for (_, token) in tokens.iter() {
            token.cancel();
        }
    }

    // ------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------

    /// Remove one owner's record and file. No-op if nothing is cached.
    #[instrument(skip(self))]
    pub async fn remove_one(&self, owner_id: &str) {
        let _write = self.write_lock.lock().await;

        let Some((namespace, root, mut next)) = self
            .state
            .read()
            .as_ref()
            .map(|s| (s.namespace.clone(), s.root.clone(), s.index.clone()))
        else {
            return;
        };

        let Some(removed) = next.remove(owner_id) else {
            return;
        };

        if let Err(e) = self.persistent.save(&namespace, &next).await {
            warn!(error = %e, "Failed to persist cache index, keeping record");
            return;
        }

        if let Some(state) = self.state.write().as_mut() {
            state.index = next;
        }

        if let Err(e) = self.store.delete(&removed.local_path).await {
            warn!(error = %e, "Failed to delete cached file");
        }

        let owner_dir = paths::owner_dir(&root, owner_id);
        if removed.local_path.parent() == Some(owner_dir.as_path()) && !self.is_downloading(owner_id)
        {
            if let Err(e) = self.store.delete_dir(&owner_dir).await {
                debug!(error = %e, "Could not remove owner cache directory");
            }
        }

        debug!("Removed cached file");
        self.emit(CacheEvent::Removed {
            owner_id: owner_id.to_string(),
        });
    }

    /// Remove every record and file of the active namespace.
    #[instrument(skip(self))]
    pub async fn remove_all(&self) {
        let _write = self.write_lock.lock().await;

        let Some((namespace, root, records)) = self.state.read().as_ref().map(|s| {
            (
                s.namespace.clone(),
                s.root.clone(),
                s.index.records().cloned().collect::<Vec<_>>(),
            )
        }) else {
            return;
        };

        if let Err(e) = self.persistent.save(&namespace, &CacheIndex::new()).await {
            warn!(error = %e, "Failed to persist empty cache index, keeping records");
            return;
        }

        if let Some(state) = self.state.write().as_mut() {
            state.index = CacheIndex::new();
        }

        for record in &records {
            if let Err(e) = self.store.delete(&record.local_path).await {
                warn!(owner_id = %record.owner_id, error = %e, "Failed to delete cached file");
            }
        }

        let idle = self.progress.borrow().is_empty();
        if idle {
            if let Err(e) = self.store.delete_dir(&root).await {
                debug!(error = %e, "Could not remove namespace cache directory");
            }
        }

        info!(removed = records.len(), "Offline cache cleared");
        self.emit(CacheEvent::Cleared {
            namespace,
            removed: records.len(),
        });
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn location(&self) -> Result<(String, PathBuf)> {
        self.state
            .read()
            .as_ref()
            .map(|s| (s.namespace.clone(), s.root.clone()))
            .ok_or(PlaybackError::NotInitialized)
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Cache(event));
        }
    }
}

/// Where one download lands, fixed when it starts.
struct DownloadTarget {
    namespace: String,
    final_path: PathBuf,
    part_path: PathBuf,
}

/// Deletes an unfinished download's partial file if the download future is
/// dropped before it settles.
struct PartialFile {
    store: FileStore,
    path: Option<PathBuf>,
}

impl PartialFile {
    fn new(store: FileStore, path: PathBuf) -> Self {
        Self {
            store,
            path: Some(path),
        }
    }

    /// The download committed or cleaned up after itself.
    fn settle(mut self) {
        self.path = None;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let store = self.store.clone();
                handle.spawn(async move {
                    if let Err(e) = store.delete(&path).await {
                        warn!(error = %e, "Failed to remove abandoned partial download");
                    }
                });
            }
            Err(_) => debug!("No runtime to remove abandoned partial download"),
        }
    }
}

/// Marks an owner as in flight for as long as it lives.
struct InFlightGuard<'a> {
    progress: &'a watch::Sender<ProgressMap>,
    owner_id: String,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(progress: &'a watch::Sender<ProgressMap>, owner_id: &str) -> Option<Self> {
        let mut accepted = false;
        progress.send_if_modified(|map| {
            if map.contains_key(owner_id) {
                return false;
            }
            map.insert(owner_id.to_string(), DownloadProgress::default());
            accepted = true;
            true
        });

        accepted.then(|| Self {
            progress,
            owner_id: owner_id.to_string(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.progress.send_modify(|map| {
            map.remove(&self.owner_id);
        });
    }
}

/// Registers a bulk token and keeps the bulk flag raised while any exists.
struct BulkGuard<'a> {
    manager: &'a OfflineCacheManager,
    id: u64,
}

impl<'a> BulkGuard<'a> {
    fn register(manager: &'a OfflineCacheManager, token: CancellationToken) -> Self {
        let id = manager.next_bulk_id.fetch_add(1, Ordering::Relaxed);
        let mut tokens = manager.bulk_tokens.lock();
        tokens.push((id, token));
        manager.bulk_in_progress.send_if_modified(|active| {
            let changed = !*active;
            *active = true;
            changed
        });
        Self { manager, id }
    }
}

impl Drop for BulkGuard<'_> {
    fn drop(&mut self) {
        let mut tokens = self.manager.bulk_tokens.lock();
        tokens.retain(|(id, _)| *id != self.id);
        let still_active = !tokens.is_empty();
        self.manager.bulk_in_progress.send_if_modified(|active| {
            let changed = *active != still_active;
            *active = still_active;
            changed
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_guard_rejects_duplicates() {
        let (progress, _rx) = watch::channel(ProgressMap::new());

        let first = InFlightGuard::acquire(&progress, "g1");
        assert!(first.is_some());
        assert!(InFlightGuard::acquire(&progress, "g1").is_none());
        assert!(InFlightGuard::acquire(&progress, "g2").is_some());

        drop(first);
        assert!(!progress.borrow().contains_key("g1"));
        assert!(InFlightGuard::acquire(&progress, "g1").is_some());
    }

    #[test]
    fn test_download_item_new() {
        let item = DownloadItem::new("g1", "https://cdn.example.com/g1.mp3", "Floor");
        assert_eq!(item.owner_id, "g1");
        assert_eq!(item.display_name, "Floor");
    }
}
