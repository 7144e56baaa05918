//! HTTP Client Abstraction
//!
//! Provides streamed downloads of remote media files.

use async_trait::async_trait;
use std::fmt;
use tokio::io::AsyncRead;

use crate::error::Result;

/// Body of a streamed download together with the size announced by the server.
pub struct DownloadStream {
    /// Total body length in bytes, when the server reported one.
    pub content_length: Option<u64>,
    /// Reader yielding the response body.
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
}

impl DownloadStream {
    pub fn new(reader: Box<dyn AsyncRead + Send + Unpin>, content_length: Option<u64>) -> Self {
        Self {
            content_length,
            reader,
        }
    }

    /// Wrap an in-memory body. The content length is the buffer size.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        let len = data.len() as u64;
        Self::new(Box::new(std::io::Cursor::new(data)), Some(len))
    }
}

impl fmt::Debug for DownloadStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadStream")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Async HTTP client trait
///
/// This trait abstracts HTTP transfers to allow platform-specific implementations.
/// Implementations should handle:
/// - TLS certificate validation
/// - Connection pooling and keep-alive
/// - Mapping non-success status codes to errors before any body is returned
///
/// Implementations must not retry on their own; callers decide whether a
/// failed transfer is attempted again.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::HttpClient;
/// use tokio::io::AsyncReadExt;
///
/// async fn fetch(client: &dyn HttpClient) -> Result<Vec<u8>> {
///     let mut stream = client.download_stream("https://cdn.example.com/floor.mp3".into()).await?;
///     let mut body = Vec::new();
///     stream.reader.read_to_end(&mut body).await?;
///     Ok(body)
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Download a resource as a stream of bytes
    ///
    /// The body is never buffered in memory as a whole.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Network connection fails
    /// - TLS validation fails
    /// - The server answers with a non-2xx status
    async fn download_stream(&self, url: String) -> Result<DownloadStream>;
}
