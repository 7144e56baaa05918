//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, filesystem,
//! settings, audio engine) into one [`MediaSession`]: the offline cache
//! manager, the playback controller, and the event bus they report to.
//! Desktop apps typically enable the `desktop-shims` feature (which depends on
//! `bridge-desktop`) so only the audio engine has to be injected.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::MediaSession;
//!
//! let config = CoreConfig::builder()
//!     .cache_dir("/var/cache/floor-music")
//!     .playback_adapter(engine)
//!     .build()?;
//! let session = MediaSession::from_config(config)?;
//! session.open_hub("hub-1").await?;
//! session.play_owner("g1", &current_url, "Floor Routine", "floor.mp3").await;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use core_playback::cache::{path_to_file_url, CacheConfig, OfflineCacheManager};
use core_playback::player::{PlaybackController, PlaybackTrack, PlayerConfig};
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventStream};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// One user session: cache and player for the active hub.
///
/// Replaces any process-wide store. Hosts create one per signed-in user and
/// drop it on sign-out.
#[derive(Clone)]
pub struct MediaSession {
    cache: Arc<OfflineCacheManager>,
    player: PlaybackController,
    events: Arc<EventBus>,
}

impl MediaSession {
    /// Build a session with default cache and player settings.
    pub fn from_config(config: CoreConfig) -> Result<Self> {
        Self::with_options(config, CacheConfig::default(), PlayerConfig::default())
    }

    /// Build a session from bridges plus explicit cache and player settings.
    pub fn with_options(
        config: CoreConfig,
        cache_config: CacheConfig,
        player_config: PlayerConfig,
    ) -> Result<Self> {
        config.validate()?;
        cache_config.validate().map_err(CoreError::Config)?;
        player_config.validate().map_err(CoreError::Config)?;

        let events = Arc::new(EventBus::new(config.event_buffer_size));

        let cache = OfflineCacheManager::new(
            cache_config,
            config.file_system.clone(),
            config.http_client.clone(),
            config.settings_store.clone(),
        )
        .with_event_bus(events.clone());

        let player = PlaybackController::with_event_bus(
            config.playback_adapter.clone(),
            player_config,
            events.clone(),
        );

        info!("Media session created");
        Ok(Self {
            cache: Arc::new(cache),
            player,
            events,
        })
    }

    /// Load the offline cache of `namespace`, replacing any other active hub.
    pub async fn open_hub(&self, namespace: &str) -> Result<()> {
        self.cache.initialize(namespace).await?;
        Ok(())
    }

    /// URI to hand to the player: the cached copy as a `file://` URL when it
    /// is still valid for `current_remote_url`, the remote URL otherwise.
    pub fn playable_uri(&self, owner_id: &str, current_remote_url: &str) -> String {
        match self.cache.resolve_playable_uri(owner_id, current_remote_url) {
            Some(path) => path_to_file_url(&path),
            None => current_remote_url.to_string(),
        }
    }

    /// Play an owner's floor music, preferring the offline copy.
    ///
    /// Toggles playback off if this owner's track is already current.
    #[instrument(skip(self, current_remote_url, display_name, file_name))]
    pub async fn play_owner(
        &self,
        owner_id: &str,
        current_remote_url: &str,
        display_name: &str,
        file_name: &str,
    ) {
        let uri = self.playable_uri(owner_id, current_remote_url);
        debug!(offline = !uri.eq(current_remote_url), "Resolved playable source");

        self.player
            .play(PlaybackTrack::new(owner_id, display_name, file_name, uri))
            .await;
    }

    pub fn cache(&self) -> &Arc<OfflineCacheManager> {
        &self.cache
    }

    pub fn player(&self) -> &PlaybackController {
        &self.player
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    /// Cancel bulk downloads and release the player.
    pub async fn shutdown(&self) {
        self.cache.cancel_bulk_download();
        self.player.stop().await;
        info!("Media session shut down");
    }
}
