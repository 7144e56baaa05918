//! # Offline Cache Module
//!
//! Downloads remote floor music for offline playback and tracks what is cached
//! per namespace (hub).
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     OfflineCacheManager                │
//! │  - initialize(namespace)               │
//! │  - download_one() / download_all()     │
//! │  - is_cached() / resolve_playable_uri()│
//! │  - remove_one() / remove_all()         │
//! └────────┬───────────────────────────────┘
//!          │
//!          ├──> PersistentIndex (SettingsStore)
//!          └──> FileStore (FileSystemAccess + HttpClient)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::cache::{CacheConfig, DownloadItem, OfflineCacheManager};
//! use tokio_util::sync::CancellationToken;
//!
//! let manager = OfflineCacheManager::new(CacheConfig::default(), fs, http, settings);
//! manager.initialize("hub-1").await?;
//!
//! if !manager.is_cached("g1", &current_url) {
//!     manager.download_one("g1", &current_url, "Floor Routine").await;
//! }
//!
//! let report = manager
//!     .download_all(&[DownloadItem::new("g2", url2, "Beam")], CancellationToken::new())
//!     .await;
//! ```

pub mod config;
pub mod index;
pub mod manager;
pub mod paths;
pub mod stats;
pub mod store;

pub use config::CacheConfig;
pub use index::{CacheIndex, CachedFileRecord, PersistentIndex};
pub use manager::{BulkDownloadReport, DownloadItem, OfflineCacheManager, ProgressMap};
pub use paths::path_to_file_url;
pub use stats::{CacheStats, DownloadProgress};
pub use store::FileStore;
