//! # Core Configuration Module
//!
//! Provides configuration management for the floor-music core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds every bridge the cache manager and playback controller
//! need. It enforces fail-fast validation so a missing capability is reported
//! at startup rather than on the first download.
//!
//! ## Required Dependencies
//!
//! - `PlaybackAdapter` - Always required; there is no portable default audio engine
//! - `FileSystemAccess` - Cached file storage (desktop default: tokio fs)
//! - `HttpClient` - Media downloads (desktop default: reqwest)
//! - `SettingsStore` - Persisted cache index (desktop default: SQLite)
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults for
//! the last three are injected automatically if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .cache_dir("/path/to/cache")
//!     .playback_adapter(Arc::new(MyAudioEngine::new()))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Panics: no playback adapter was injected
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing playback adapter");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{FileSystemAccess, HttpClient, PlaybackAdapter, SettingsStore};
use std::path::PathBuf;
use std::sync::Arc;

/// Default capacity of the event bus built from this configuration.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = crate::events::DEFAULT_EVENT_BUFFER_SIZE;

/// Core configuration for the floor-music core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Base directory for cached media and, on desktop, the settings database
    pub cache_dir: Option<PathBuf>,

    /// File system access abstraction
    pub file_system: Arc<dyn FileSystemAccess>,

    /// HTTP client used for media downloads
    pub http_client: Arc<dyn HttpClient>,

    /// Key-value store backing the persisted cache index
    pub settings_store: Arc<dyn SettingsStore>,

    /// Host audio engine
    pub playback_adapter: Arc<dyn PlaybackAdapter>,

    /// Capacity of the event bus
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("cache_dir", &self.cache_dir)
            .field("file_system", &"FileSystemAccess { ... }")
            .field("http_client", &"HttpClient { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field("playback_adapter", &"PlaybackAdapter { ... }")
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if let Some(cache_dir) = &self.cache_dir {
            if cache_dir.as_os_str().is_empty() {
                return Err(Error::Config("Cache directory cannot be empty".to_string()));
            }
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn playback_adapter_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "PlaybackAdapter".to_string(),
        message: "PlaybackAdapter implementation is required to play floor music. \
                 Mobile: inject the native player (AVPlayer/ExoPlayer). \
                 Desktop: inject an adapter over the host audio output."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn capability_missing_error(capability: &str, purpose: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!(
            "{} implementation is required for {}. \
             Desktop: enable the 'desktop-shims' feature to use the default adapters. \
             Mobile: inject the platform-native implementation.",
            capability, purpose
        ),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system(cache_dir: Option<&PathBuf>) -> Result<Arc<dyn FileSystemAccess>> {
    use bridge_desktop::TokioFileSystem;

    let fs = match cache_dir {
        Some(dir) => TokioFileSystem::with_cache_directory(dir.clone()),
        None => TokioFileSystem::new(),
    };
    Ok(Arc::new(fs))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system(_cache_dir: Option<&PathBuf>) -> Result<Arc<dyn FileSystemAccess>> {
    Err(capability_missing_error(
        "FileSystemAccess",
        "storing cached media",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Ok(Arc::new(bridge_desktop::ReqwestHttpClient::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(capability_missing_error("HttpClient", "downloading media"))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(cache_dir: Option<&PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;
    use std::thread;
    use tokio::runtime::{Handle, Runtime};

    let cache_dir = cache_dir.ok_or_else(|| {
        Error::Config(
            "Cache directory is required to place the default settings database. \
             Use .cache_dir() or inject a SettingsStore."
                .to_string(),
        )
    })?;
    let candidate = cache_dir.join("settings.db");

    let init_store = |path: PathBuf| -> Result<_> {
        let runtime = Runtime::new().map_err(|e| {
            Error::Internal(format!(
                "Failed to create Tokio runtime for default settings store: {}",
                e
            ))
        })?;

        runtime
            .block_on(SqliteSettingsStore::new(path))
            .map_err(|e| {
                Error::Internal(format!("Failed to initialize default SettingsStore: {}", e))
            })
    };

    let store = match Handle::try_current() {
        Ok(_) => thread::spawn(move || init_store(candidate))
            .join()
            .map_err(|_| {
                Error::Internal(
                    "Worker thread panicked while creating default SettingsStore".to_string(),
                )
            })??,
        Err(_) => init_store(candidate)?,
    };

    let store: Arc<dyn SettingsStore> = Arc::new(store);
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(_cache_dir: Option<&PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    Err(capability_missing_error(
        "SettingsStore",
        "persisting the offline cache index",
    ))
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    cache_dir: Option<PathBuf>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    http_client: Option<Arc<dyn HttpClient>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    playback_adapter: Option<Arc<dyn PlaybackAdapter>>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the base cache directory.
    ///
    /// Only consulted when a desktop default adapter is created.
    pub fn cache_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    /// Injects a file system implementation.
    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Injects an HTTP client implementation.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Injects a settings store implementation.
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Injects the host playback adapter (required).
    pub fn playback_adapter(mut self, adapter: Arc<dyn PlaybackAdapter>) -> Self {
        self.playback_adapter = Some(adapter);
        self
    }

    /// Sets the event bus capacity.
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when a required bridge is absent and no
    ///   default is available
    /// - [`Error::Config`] when a value is invalid
    pub fn build(self) -> Result<CoreConfig> {
        let playback_adapter = self
            .playback_adapter
            .ok_or_else(playback_adapter_missing_error)?;

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system(self.cache_dir.as_ref())?,
        };

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(self.cache_dir.as_ref())?,
        };

        let config = CoreConfig {
            cache_dir: self.cache_dir,
            file_system,
            http_client,
            settings_store,
            playback_adapter,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
