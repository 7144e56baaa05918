//! Cache configuration

/// Configuration for the offline cache manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Directory for cached files, relative to the host cache directory
    pub cache_directory: String,

    /// Prefix of the settings key holding a namespace's persisted index.
    /// The full key is `{index_key_prefix}{namespace}`.
    pub index_key_prefix: String,

    /// Buffer size used when copying a download body to disk (default: 64KB)
    pub copy_buffer_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_directory: "floor_music".to_string(),
            index_key_prefix: "offline_cache_index:".to_string(),
            copy_buffer_size: 64 * 1024,
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set cache directory name.
    pub fn with_cache_directory(mut self, dir: impl Into<String>) -> Self {
        self.cache_directory = dir.into();
        self
    }

    /// Set the persisted index key prefix.
    pub fn with_index_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.index_key_prefix = prefix.into();
        self
    }

    /// Set the download copy buffer size.
    pub fn with_copy_buffer_size(mut self, bytes: usize) -> Self {
        self.copy_buffer_size = bytes;
        self
    }

    /// Settings key for a namespace's persisted index.
    pub fn index_key(&self, namespace: &str) -> String {
        format!("{}{}", self.index_key_prefix, namespace)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_directory.is_empty() {
            return Err("cache_directory cannot be empty".to_string());
        }

        if self.cache_directory.contains("..") {
            return Err("cache_directory must stay inside the host cache directory".to_string());
        }

        if self.index_key_prefix.is_empty() {
            return Err("index_key_prefix cannot be empty".to_string());
        }

        if self.copy_buffer_size == 0 {
            return Err("copy_buffer_size must be greater than 0".to_string());
        }

        Ok(())
    }
}
