//! Storage and File System Abstractions
//!
//! Provides platform-agnostic traits for file I/O and key-value settings
//! storage.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWrite;

use crate::error::Result;

/// File metadata information
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    pub modified_at: Option<i64>,
    pub is_directory: bool,
}

/// File system access trait
///
/// Abstracts file I/O operations to support different platforms:
/// - Desktop: Direct filesystem access
/// - iOS/Android: Sandboxed app directories
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn music_dir(fs: &dyn FileSystemAccess) -> Result<PathBuf> {
///     let dir = fs.get_cache_directory().await?.join("floor-music");
///     fs.create_dir_all(&dir).await?;
///     Ok(dir)
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Get the application's cache directory
    ///
    /// Files stored here may be removed by the operating system when storage
    /// runs low, so callers must be prepared for them to vanish.
    async fn get_cache_directory(&self) -> Result<PathBuf>;

    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get metadata for a file or directory
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// List the entries directly inside a directory
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Delete a file
    ///
    /// Deleting a path that does not exist succeeds.
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// Delete a directory and all its contents
    ///
    /// Deleting a directory that does not exist succeeds.
    async fn delete_dir_all(&self, path: &Path) -> Result<()>;

    /// Atomically move `from` to `to`, replacing any file already at `to`
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Open a file for streaming writes, truncating existing content
    async fn open_write_stream(&self, path: &Path) -> Result<Box<dyn AsyncWrite + Send + Unpin>>;
}

/// Key-value settings storage trait
///
/// Abstracts platform-specific preferences/settings storage:
/// - iOS: UserDefaults
/// - Android: SharedPreferences / DataStore
/// - Desktop: SQLite-backed table
///
/// Values are opaque strings; callers own their serialization.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn remember_hub(store: &dyn SettingsStore) -> Result<()> {
///     store.set_string("last_hub", "hub-42").await
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Store a string value, replacing any previous value
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Delete a setting. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a setting exists
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get_string(key).await?.is_some())
    }

    /// List all setting keys
    async fn list_keys(&self) -> Result<Vec<String>>;
}
