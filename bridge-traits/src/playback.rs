//! Playback bridge traits and supporting audio types.
//!
//! These abstractions let the core playback controller drive a
//! platform-specific audio engine (AVPlayer, ExoPlayer, a desktop sink)
//! through one async surface. The host owns decoding and output; the core
//! only opens, controls and releases sessions.

use crate::error::Result;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// High-level audio source descriptor provided to playback adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Local file accessible to the host runtime.
    LocalFile { path: PathBuf },
    /// Remote HTTP(S) resource fetched by the host.
    RemoteStream { url: String },
}

impl AudioSource {
    /// Classify a playable URI.
    ///
    /// `file://` URLs and bare absolute paths map to [`AudioSource::LocalFile`];
    /// everything else is treated as remote.
    pub fn from_uri(uri: &str) -> Self {
        if let Some(path) = uri.strip_prefix("file://") {
            // file:///C:/music.mp3 carries an extra slash before the drive letter
            let path = match path.as_bytes() {
                [b'/', _, b':', ..] => &path[1..],
                _ => path,
            };
            return AudioSource::LocalFile {
                path: PathBuf::from(path),
            };
        }

        if uri.starts_with('/') || looks_like_windows_path(uri) {
            return AudioSource::LocalFile {
                path: PathBuf::from(uri),
            };
        }

        AudioSource::RemoteStream {
            url: uri.to_string(),
        }
    }

    /// Determine whether the source represents remote content.
    pub fn is_remote(&self) -> bool {
        matches!(self, AudioSource::RemoteStream { .. })
    }
}

fn looks_like_windows_path(uri: &str) -> bool {
    let bytes = uri.as_bytes();
    bytes.len() > 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'\\'
}

/// Options applied when a session is opened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackOptions {
    /// Initial volume (0.0 = muted, 1.0 = unity gain).
    pub initial_volume: f32,
    /// How often the adapter should publish status updates.
    pub status_interval: Duration,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            initial_volume: 1.0,
            status_interval: Duration::from_millis(500),
        }
    }
}

/// Unique identifier for playback sessions managed by a host adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackSessionId(Uuid);

impl PlaybackSessionId {
    /// Generate a new session identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PlaybackSessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlaybackSessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Periodic status published by an open session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackStatus {
    /// Current position within the resource.
    pub position: Duration,
    /// Total duration, once the engine knows it.
    pub duration: Option<Duration>,
    /// Whether audio is currently being rendered.
    pub is_playing: bool,
    /// Set exactly once, on the update emitted when the resource reached its end.
    pub did_just_finish: bool,
}

/// An opened audio resource.
///
/// The adapter keeps the sending half of `status` and publishes updates until
/// the session is unloaded, at which point the channel closes.
#[derive(Debug)]
pub struct PlaybackSession {
    pub id: PlaybackSessionId,
    pub status: mpsc::UnboundedReceiver<PlaybackStatus>,
}

/// Trait for platform-specific playback adapters that drive native audio engines.
///
/// Every control call after [`unload`](PlaybackAdapter::unload) must fail with
/// [`BridgeError::SessionNotFound`](crate::error::BridgeError::SessionNotFound)
/// rather than panic, because the core may race an explicit stop against an
/// autonomous end-of-track release.
#[async_trait::async_trait]
pub trait PlaybackAdapter: Send + Sync {
    /// Open a resource without starting playback.
    async fn load(&self, source: AudioSource, options: PlaybackOptions) -> Result<PlaybackSession>;

    /// Begin or resume playback for the provided session.
    async fn play(&self, session: PlaybackSessionId) -> Result<()>;

    /// Pause playback without releasing the session.
    async fn pause(&self, session: PlaybackSessionId) -> Result<()>;

    /// Seek to an absolute position within the resource.
    async fn seek(&self, session: PlaybackSessionId, position: Duration) -> Result<()>;

    /// Adjust playback volume. Volume is normalized to `0.0..=1.0`.
    async fn set_volume(&self, session: PlaybackSessionId, volume: f32) -> Result<()>;

    /// Stop playback and release every resource associated with the session.
    async fn unload(&self, session: PlaybackSessionId) -> Result<()>;
}
