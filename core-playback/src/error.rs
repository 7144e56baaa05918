//! # Playback Error Types
//!
//! Error types shared by the offline cache and the playback controller.
//!
//! Public cache and player operations absorb these into `bool`/unit results
//! and a log line; the internal steps they are built from return
//! [`Result`] so failures compose with `?`.

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Errors that can occur during cache and playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Cache Errors
    // ========================================================================
    /// Offline cache operation failed.
    #[error("Cache error: {0}")]
    CacheError(String),

    /// The cache manager has not been initialized for a namespace.
    #[error("Offline cache not initialized")]
    NotInitialized,

    /// Downloading a remote file failed.
    #[error("Download failed for {owner_id}: {reason}")]
    DownloadFailed { owner_id: String, reason: String },

    /// Persisted cache index could not be encoded or decoded.
    #[error("Cache index serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Host bridge reported an error.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            PlaybackError::DownloadFailed { .. } => true,
            PlaybackError::Bridge(BridgeError::HttpStatus { status, .. }) => *status >= 500,
            PlaybackError::Bridge(BridgeError::OperationFailed(_)) => true,
            _ => false,
        }
    }

    /// Returns `true` if the error means a released playback session was touched.
    ///
    /// Such races between an explicit stop and an end-of-track release are
    /// expected and not worth more than a debug log.
    pub fn is_released_session(&self) -> bool {
        matches!(self, PlaybackError::Bridge(BridgeError::SessionNotFound(_)))
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
