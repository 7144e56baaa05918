//! Cache statistics and download progress

use serde::{Deserialize, Serialize};

/// Statistics about the offline cache of the active namespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cached records
    pub cached_files: usize,

    /// Total bytes used by cached files (sum of measured sizes)
    pub total_bytes: u64,
}

impl CacheStats {
    /// Returns average bytes per cached file.
    pub fn average_file_size(&self) -> u64 {
        if self.cached_files == 0 {
            0
        } else {
            self.total_bytes / self.cached_files as u64
        }
    }
}

/// Progress of one in-flight download.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProgress {
    /// Bytes written to disk so far
    pub bytes_written: u64,

    /// Expected total, when the server announced one
    pub total_bytes: Option<u64>,
}

impl DownloadProgress {
    /// Progress as a fraction in `[0, 1]`; `0.0` while the total is unknown.
    pub fn fraction(&self) -> f64 {
        match self.total_bytes {
            Some(total) if total > 0 => (self.bytes_written as f64 / total as f64).min(1.0),
            _ => 0.0,
        }
    }

    /// Record newly written bytes. Never moves backwards.
    pub fn advance(&mut self, bytes: u64) {
        self.bytes_written = self.bytes_written.saturating_add(bytes);
    }
}
