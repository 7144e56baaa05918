//! # Floor Music Playback
//!
//! Offline cache and playback state machine for per-owner floor music.
//!
//! ## Overview
//!
//! - [`cache`]: downloads each owner's audio file into a namespaced cache
//!   directory, keeps a persisted index of what is cached, and answers
//!   "is there a valid local copy for this owner and URL?"
//! - [`player`]: drives one shared audio player through the host
//!   [`PlaybackAdapter`](bridge_traits::playback::PlaybackAdapter), preferring
//!   the cached copy over the remote URL.
//!
//! Both halves publish their observable state through `tokio::sync::watch`
//! channels and, when configured with an
//! [`EventBus`](core_runtime::events::EventBus), emit
//! [`CoreEvent`](core_runtime::events::CoreEvent)s.

pub mod cache;
pub mod error;
pub mod player;

pub use cache::{
    BulkDownloadReport, CacheConfig, CacheStats, CachedFileRecord, DownloadItem,
    DownloadProgress, OfflineCacheManager, ProgressMap,
};
pub use error::{PlaybackError, Result};
pub use player::{PlaybackController, PlaybackSnapshot, PlaybackTrack, PlayerConfig, PlayerState};
