//! File store: the cache manager's view of the host file system and network.

use crate::cache::stats::DownloadProgress;
use crate::error::Result;
use bridge_traits::{http::HttpClient, storage::FileSystemAccess};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

/// Composes [`FileSystemAccess`] and [`HttpClient`] into the handful of
/// operations the cache needs.
#[derive(Clone)]
pub struct FileStore {
    fs: Arc<dyn FileSystemAccess>,
    http: Arc<dyn HttpClient>,
    buffer_size: usize,
}

impl FileStore {
    pub fn new(fs: Arc<dyn FileSystemAccess>, http: Arc<dyn HttpClient>, buffer_size: usize) -> Self {
        Self {
            fs,
            http,
            buffer_size: buffer_size.max(1),
        }
    }

    pub async fn cache_root(&self) -> Result<PathBuf> {
        Ok(self.fs.get_cache_directory().await?)
    }

    /// Errors are reported as "missing".
    pub async fn exists(&self, path: &Path) -> bool {
        match self.fs.exists(path).await {
            Ok(exists) => exists,
            Err(e) => {
                debug!(error = %e, "exists() failed, treating file as missing");
                false
            }
        }
    }

    pub async fn size(&self, path: &Path) -> Result<u64> {
        Ok(self.fs.metadata(path).await?.size)
    }

    /// Direct entries of `dir`. A missing directory is empty.
    pub async fn list(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        match self.fs.list_directory(dir).await {
            Ok(entries) => Ok(entries),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn make_dir(&self, path: &Path) -> Result<()> {
        Ok(self.fs.create_dir_all(path).await?)
    }

    /// Stream `url` into `dest`, reporting progress after every chunk.
    ///
    /// `dest` is truncated first. On error the caller owns cleanup of the
    /// partially written file.
    pub async fn download<F>(&self, url: &str, dest: &Path, mut on_progress: F) -> Result<u64>
    where
        F: FnMut(DownloadProgress) + Send,
    {
        let mut stream = self.http.download_stream(url.to_string()).await?;
        let mut writer = self.fs.open_write_stream(dest).await?;

        let mut progress = DownloadProgress {
            bytes_written: 0,
            total_bytes: stream.content_length,
        };
        on_progress(progress);

        let mut buf = vec![0u8; self.buffer_size];
        loop {
            let n = stream.reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n]).await?;
            progress.advance(n as u64);
            on_progress(progress);
        }

        writer.flush().await?;
        writer.shutdown().await?;

        if let Some(expected) = progress.total_bytes {
            if expected != progress.bytes_written {
                warn!(
                    expected,
                    written = progress.bytes_written,
                    "Download size differs from announced content length"
                );
            }
        }

        Ok(progress.bytes_written)
    }

    /// Idempotent: deleting a missing file succeeds.
    pub async fn delete(&self, path: &Path) -> Result<()> {
        match self.fs.delete_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_dir(&self, path: &Path) -> Result<()> {
        match self.fs.delete_dir_all(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        Ok(self.fs.rename(from, to).await?)
    }
}
