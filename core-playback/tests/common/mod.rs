//! In-memory bridge implementations shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{DownloadStream, HttpClient};
use bridge_traits::playback::{
    AudioSource, PlaybackAdapter, PlaybackOptions, PlaybackSession, PlaybackSessionId,
    PlaybackStatus,
};
use bridge_traits::storage::{FileMetadata, FileSystemAccess, SettingsStore};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::{mpsc, Semaphore};

pub const CACHE_ROOT: &str = "/cache";

fn not_found(path: &Path) -> BridgeError {
    BridgeError::Io(io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} not found", path.display()),
    ))
}

// ----------------------------------------------------------------------
// File system
// ----------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
    dirs: Mutex<HashSet<PathBuf>>,
    pub fail_rename: AtomicBool,
}

impl MemoryFileSystem {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Write a file, creating its parent directories.
    pub fn put(&self, path: impl Into<PathBuf>, contents: &[u8]) {
        let path = path.into();
        if let Some(parent) = path.parent() {
            let mut dirs = self.dirs.lock();
            for ancestor in parent.ancestors() {
                dirs.insert(ancestor.to_path_buf());
            }
        }
        self.files.lock().insert(path, contents.to_vec());
    }

    pub fn read(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.lock().get(path).cloned()
    }

    pub fn has_file(&self, path: &Path) -> bool {
        self.files.lock().contains_key(path)
    }

    pub fn has_dir(&self, path: &Path) -> bool {
        self.dirs.lock().contains(path)
    }

    pub fn remove(&self, path: &Path) {
        self.files.lock().remove(path);
    }

    /// Files whose path ends with `suffix`.
    pub fn files_ending_with(&self, suffix: &str) -> Vec<PathBuf> {
        self.file_paths()
            .into_iter()
            .filter(|p| p.to_string_lossy().ends_with(suffix))
            .collect()
    }

    pub fn file_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.files.lock().keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl FileSystemAccess for MemoryFileSystem {
    async fn get_cache_directory(&self) -> Result<PathBuf> {
        Ok(PathBuf::from(CACHE_ROOT))
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.has_file(path) || self.has_dir(path))
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let size = self
            .files
            .lock()
            .get(path)
            .map(|data| data.len() as u64)
            .ok_or_else(|| not_found(path))?;
        Ok(FileMetadata {
            size,
            modified_at: None,
            is_directory: false,
        })
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>> {
        if !self.has_dir(path) {
            return Err(not_found(path));
        }
        let mut entries: Vec<PathBuf> = self
            .files
            .lock()
            .keys()
            .chain(self.dirs.lock().iter())
            .filter(|entry| entry.parent() == Some(path))
            .cloned()
            .collect();
        entries.sort();
        entries.dedup();
        Ok(entries)
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut dirs = self.dirs.lock();
        for ancestor in path.ancestors() {
            dirs.insert(ancestor.to_path_buf());
        }
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        self.files
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }

    async fn delete_dir_all(&self, path: &Path) -> Result<()> {
        self.files.lock().retain(|file, _| !file.starts_with(path));
        let mut dirs = self.dirs.lock();
        let existed = dirs.contains(path);
        dirs.retain(|dir| !dir.starts_with(path));
        if existed {
            Ok(())
        } else {
            Err(not_found(path))
        }
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        if self.fail_rename.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("rename refused".into()));
        }
        let mut files = self.files.lock();
        let data = files.remove(from).ok_or_else(|| not_found(from))?;
        files.insert(to.to_path_buf(), data);
        Ok(())
    }

    async fn open_write_stream(&self, path: &Path) -> Result<Box<dyn AsyncWrite + Send + Unpin>> {
        self.files.lock().insert(path.to_path_buf(), Vec::new());
        Ok(Box::new(MemoryWriter {
            files: Arc::clone(&self.files),
            path: path.to_path_buf(),
        }))
    }
}

struct MemoryWriter {
    files: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
    path: PathBuf,
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.files
            .lock()
            .entry(self.path.clone())
            .or_default()
            .extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

// ----------------------------------------------------------------------
// Settings
// ----------------------------------------------------------------------

#[derive(Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, String>>,
    pub fail_writes: AtomicBool,
}

impl MemorySettings {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    pub fn put_raw(&self, key: &str, value: &str) {
        self.values.lock().insert(key.to_string(), value.to_string());
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("settings are read-only".into()));
        }
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.values.lock().remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.values.lock().keys().cloned().collect())
    }
}

// ----------------------------------------------------------------------
// HTTP
// ----------------------------------------------------------------------

#[derive(Clone)]
pub enum FakeResponse {
    Body(Vec<u8>),
    Status(u16),
    /// Sends the given bytes, then fails the connection.
    Truncated(Vec<u8>),
    /// Sends the given bytes without announcing a length, then never
    /// produces more.
    Stalled(Vec<u8>),
    /// Full body without a content length.
    Unsized(Vec<u8>),
}

#[derive(Default)]
pub struct FakeHttpClient {
    responses: Mutex<HashMap<String, FakeResponse>>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    requests: Mutex<Vec<String>>,
}

impl FakeHttpClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, url: &str, response: FakeResponse) {
        self.responses.lock().insert(url.to_string(), response);
    }

    pub fn serve(&self, url: &str, body: &[u8]) {
        self.respond(url, FakeResponse::Body(body.to_vec()));
    }

    /// Hold requests for `url` until a permit is added to the returned gate.
    pub fn gate(&self, url: &str) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.gates.lock().insert(url.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpClient for FakeHttpClient {
    async fn download_stream(&self, url: String) -> Result<DownloadStream> {
        self.requests.lock().push(url.clone());

        let gate = self.gates.lock().get(&url).cloned();
        if let Some(gate) = gate {
            gate.acquire()
                .await
                .map_err(|e| BridgeError::OperationFailed(e.to_string()))?
                .forget();
        }

        let response = self.responses.lock().get(&url).cloned();
        match response {
            Some(FakeResponse::Body(body)) => Ok(DownloadStream::from_bytes(body)),
            Some(FakeResponse::Status(status)) => Err(BridgeError::HttpStatus { status, url }),
            Some(FakeResponse::Truncated(body)) => {
                let announced = body.len() as u64 * 2;
                Ok(DownloadStream::new(
                    Box::new(FailingReader { body, sent: false }),
                    Some(announced),
                ))
            }
            Some(FakeResponse::Stalled(body)) => Ok(DownloadStream::new(
                Box::new(StalledReader { body, sent: false }),
                None,
            )),
            Some(FakeResponse::Unsized(body)) => {
                Ok(DownloadStream::new(Box::new(io::Cursor::new(body)), None))
            }
            None => Err(BridgeError::HttpStatus { status: 404, url }),
        }
    }
}

struct StalledReader {
    body: Vec<u8>,
    sent: bool,
}

impl AsyncRead for StalledReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.sent {
            return Poll::Pending;
        }
        let n = self.body.len().min(buf.remaining());
        buf.put_slice(&self.body[..n]);
        self.sent = true;
        Poll::Ready(Ok(()))
    }
}

struct FailingReader {
    body: Vec<u8>,
    sent: bool,
}

impl AsyncRead for FailingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.sent {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset",
            )));
        }
        let n = self.body.len().min(buf.remaining());
        buf.put_slice(&self.body[..n]);
        self.sent = true;
        Poll::Ready(Ok(()))
    }
}

// ----------------------------------------------------------------------
// Playback
// ----------------------------------------------------------------------

#[derive(Default)]
struct AdapterState {
    open: HashMap<PlaybackSessionId, mpsc::UnboundedSender<PlaybackStatus>>,
    max_open: usize,
    loaded: Vec<(AudioSource, PlaybackOptions)>,
    calls: Vec<String>,
}

/// Records every call and enforces that released sessions reject control.
#[derive(Default)]
pub struct FakePlaybackAdapter {
    state: Mutex<AdapterState>,
    pub fail_load: AtomicBool,
}

impl FakePlaybackAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open_sessions(&self) -> usize {
        self.state.lock().open.len()
    }

    pub fn max_open_sessions(&self) -> usize {
        self.state.lock().max_open
    }

    pub fn loaded_sources(&self) -> Vec<AudioSource> {
        self.state.lock().loaded.iter().map(|(s, _)| s.clone()).collect()
    }

    pub fn loaded_options(&self) -> Vec<PlaybackOptions> {
        self.state.lock().loaded.iter().map(|(_, o)| *o).collect()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Publish a status update on every open session.
    pub fn publish(&self, status: PlaybackStatus) {
        for sender in self.state.lock().open.values() {
            let _ = sender.send(status);
        }
    }

    pub fn finish_current(&self) {
        self.publish(PlaybackStatus {
            did_just_finish: true,
            ..PlaybackStatus::default()
        });
    }

    /// Drop a session as if the host engine released it on its own.
    pub fn release_all(&self) {
        self.state.lock().open.clear();
    }

    fn control(&self, session: PlaybackSessionId, call: String) -> Result<()> {
        let mut state = self.state.lock();
        if !state.open.contains_key(&session) {
            return Err(BridgeError::SessionNotFound(session.to_string()));
        }
        state.calls.push(call);
        Ok(())
    }
}

#[async_trait]
impl PlaybackAdapter for FakePlaybackAdapter {
    async fn load(&self, source: AudioSource, options: PlaybackOptions) -> Result<PlaybackSession> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("cannot open source".into()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let id = PlaybackSessionId::new();

        let mut state = self.state.lock();
        state.open.insert(id, tx);
        state.max_open = state.max_open.max(state.open.len());
        state.loaded.push((source, options));
        state.calls.push("load".to_string());

        Ok(PlaybackSession { id, status: rx })
    }

    async fn play(&self, session: PlaybackSessionId) -> Result<()> {
        self.control(session, "play".to_string())
    }

    async fn pause(&self, session: PlaybackSessionId) -> Result<()> {
        self.control(session, "pause".to_string())
    }

    async fn seek(&self, session: PlaybackSessionId, position: Duration) -> Result<()> {
        self.control(session, format!("seek:{}", position.as_millis()))
    }

    async fn set_volume(&self, session: PlaybackSessionId, volume: f32) -> Result<()> {
        self.control(session, format!("volume:{:.2}", volume))
    }

    async fn unload(&self, session: PlaybackSessionId) -> Result<()> {
        let mut state = self.state.lock();
        if state.open.remove(&session).is_none() {
            return Err(BridgeError::SessionNotFound(session.to_string()));
        }
        state.calls.push("unload".to_string());
        Ok(())
    }
}

/// Yield until `condition` holds or a second passes.
pub async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
