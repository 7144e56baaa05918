//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the floor-music core and
//! platform-specific implementations. Each trait represents a capability the
//! core requires but that must be implemented differently per platform
//! (desktop, iOS, Android).
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Streamed downloads of remote media
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Cache directory, file writes, idempotent deletes
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Durable key-value store (holds the offline cache index)
//!
//! ### Audio
//! - [`PlaybackAdapter`](playback::PlaybackAdapter) - Opens and controls one audio resource per session
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ File system, HTTP, settings |
//! | iOS      | TBD                 | 📋 Planned |
//! | Android  | TBD                 | 📋 Planned |
//!
//! No desktop `PlaybackAdapter` ships with the workspace; hosts inject their
//! own audio engine.
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should:
//!
//! - Convert platform-specific errors to `BridgeError`
//! - Report missing files as `BridgeError::Io` with `ErrorKind::NotFound`
//! - Report released playback sessions as `BridgeError::SessionNotFound`
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent
//! usage across async tasks.

pub mod error;
pub mod http;
pub mod playback;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{DownloadStream, HttpClient};
pub use playback::{
    AudioSource, PlaybackAdapter, PlaybackOptions, PlaybackSession, PlaybackSessionId,
    PlaybackStatus,
};
pub use storage::{FileMetadata, FileSystemAccess, SettingsStore};
pub use time::{Clock, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
