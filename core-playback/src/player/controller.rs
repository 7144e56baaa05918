//! # Playback Controller
//!
//! Drives the single shared audio player through a host [`PlaybackAdapter`].
//!
//! Commands (`play`, `pause`, `resume`, `seek`, `stop`, `set_volume`) are
//! serialized, so a new track is only opened after the previous one has been
//! released. Status updates arrive on a per-session task; every update is
//! checked against the session generation it was spawned for, so updates from
//! a released session are dropped.
//!
//! Adapter failures never reach the caller. A call against a session the host
//! already released is expected (explicit stop racing a natural end of track)
//! and is logged at debug level.

use crate::error::PlaybackError;
use crate::player::config::{clamp_volume, PlayerConfig};
use crate::player::state::{PlaybackSnapshot, PlaybackTrack, PlayerState};
use bridge_traits::playback::{
    AudioSource, PlaybackAdapter, PlaybackOptions, PlaybackSessionId, PlaybackStatus,
};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use core_runtime::logging::redact_url;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

#[derive(Default)]
struct SessionSlot {
    session: Option<PlaybackSessionId>,
    generation: u64,
    status_task: Option<JoinHandle<()>>,
}

struct Shared {
    adapter: Arc<dyn PlaybackAdapter>,
    config: PlayerConfig,
    event_bus: Option<Arc<EventBus>>,
    commands: tokio::sync::Mutex<()>,
    slot: Mutex<SessionSlot>,
    snapshot: watch::Sender<PlaybackSnapshot>,
}

/// Handle to the shared player. Cheap to clone.
#[derive(Clone)]
pub struct PlaybackController {
    shared: Arc<Shared>,
}

impl PlaybackController {
    pub fn new(adapter: Arc<dyn PlaybackAdapter>, config: PlayerConfig) -> Self {
        Self::build(adapter, config, None)
    }

    pub fn with_event_bus(
        adapter: Arc<dyn PlaybackAdapter>,
        config: PlayerConfig,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self::build(adapter, config, Some(event_bus))
    }

    fn build(
        adapter: Arc<dyn PlaybackAdapter>,
        config: PlayerConfig,
        event_bus: Option<Arc<EventBus>>,
    ) -> Self {
        let snapshot = PlaybackSnapshot {
            volume: clamp_volume(config.initial_volume),
            ..PlaybackSnapshot::default()
        };

        Self {
            shared: Arc::new(Shared {
                adapter,
                config,
                event_bus,
                commands: tokio::sync::Mutex::new(()),
                slot: Mutex::new(SessionSlot::default()),
                snapshot: watch::channel(snapshot).0,
            }),
        }
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    /// Observe state, current track, position, duration and volume.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.shared.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    pub fn state(&self) -> PlayerState {
        self.shared.snapshot.borrow().state
    }

    pub fn current_track(&self) -> Option<PlaybackTrack> {
        self.shared.snapshot.borrow().track.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.shared.snapshot.borrow().is_playing()
    }

    pub fn position(&self) -> Duration {
        self.shared.snapshot.borrow().position
    }

    pub fn duration(&self) -> Duration {
        self.shared.snapshot.borrow().duration
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Play `track`, or stop if it is already the current track.
    ///
    /// Any other current track is stopped and released before `track` is
    /// opened.
    #[instrument(skip(self, track), fields(owner_id = %track.owner_id))]
    pub async fn play(&self, track: PlaybackTrack) {
        let _commands = self.shared.commands.lock().await;

        let is_current = self
            .shared
            .snapshot
            .borrow()
            .owner_id()
            .is_some_and(|owner| owner == track.owner_id);

        self.shared.stop_current().await;
        if is_current {
            debug!("Toggled current track off");
            return;
        }

        self.shared.start(track).await;
    }

    /// Pause playback. No-op when idle.
    pub async fn pause(&self) {
        let _commands = self.shared.commands.lock().await;
        let Some((session, owner_id)) = self.shared.active_session() else {
            return;
        };

        match self.shared.adapter.pause(session).await {
            Ok(()) => {
                let position = self.shared.transition(PlayerState::pause);
                self.shared.emit(PlaybackEvent::Paused {
                    owner_id,
                    position_ms: position.as_millis() as u64,
                });
            }
            Err(e) => self.shared.absorb("pause", e.into()),
        }
    }

    /// Resume playback. No-op when idle.
    pub async fn resume(&self) {
        let _commands = self.shared.commands.lock().await;
        let Some((session, owner_id)) = self.shared.active_session() else {
            return;
        };

        match self.shared.adapter.play(session).await {
            Ok(()) => {
                let position = self.shared.transition(PlayerState::resume);
                self.shared.emit(PlaybackEvent::Resumed {
                    owner_id,
                    position_ms: position.as_millis() as u64,
                });
            }
            Err(e) => self.shared.absorb("resume", e.into()),
        }
    }

    /// Release the current resource, if any, and return to idle.
    pub async fn stop(&self) {
        let _commands = self.shared.commands.lock().await;
        self.shared.stop_current().await;
    }

    /// Reposition without changing play/pause state. No-op when idle.
    pub async fn seek(&self, position: Duration) {
        let _commands = self.shared.commands.lock().await;
        let Some((session, owner_id)) = self.shared.active_session() else {
            return;
        };

        match self.shared.adapter.seek(session, position).await {
            Ok(()) => {
                let mut duration = Duration::ZERO;
                self.shared.snapshot.send_modify(|snapshot| {
                    snapshot.position = position;
                    duration = snapshot.duration;
                });
                self.shared.emit(PlaybackEvent::PositionChanged {
                    owner_id,
                    position_ms: position.as_millis() as u64,
                    duration_ms: duration.as_millis() as u64,
                });
            }
            Err(e) => self.shared.absorb("seek", e.into()),
        }
    }

    /// Convenience for [`seek`](Self::seek) with a millisecond offset.
    pub async fn seek_ms(&self, position_ms: u64) {
        self.seek(Duration::from_millis(position_ms)).await
    }

    /// Set the volume, clamped to `0.0..=1.0`. Applies to the current track
    /// and every track opened afterwards.
    pub async fn set_volume(&self, volume: f32) {
        let _commands = self.shared.commands.lock().await;
        let volume = clamp_volume(volume);
        self.shared.snapshot.send_modify(|snapshot| snapshot.volume = volume);

        if let Some((session, _)) = self.shared.active_session() {
            if let Err(e) = self.shared.adapter.set_volume(session, volume).await {
                self.shared.absorb("set_volume", e.into());
            }
        }
    }
}

impl Shared {
    /// Open, start and observe `track`. Must hold the command lock.
    async fn start(self: &Arc<Self>, track: PlaybackTrack) {
        let volume = self.snapshot.borrow().volume;
        let options = PlaybackOptions {
            initial_volume: volume,
            status_interval: self.config.status_interval,
        };
        let source = AudioSource::from_uri(&track.uri);

        let session = match self.adapter.load(source, options).await {
            Ok(session) => session,
            Err(e) => {
                warn!(uri = %redact_url(&track.uri), error = %e, "Failed to open track");
                return;
            }
        };

        if let Err(e) = self.adapter.play(session.id).await {
            warn!(error = %e, "Failed to start playback");
            if let Err(e) = self.adapter.unload(session.id).await {
                self.absorb("unload", e.into());
            }
            return;
        }

        let generation = {
            let mut slot = self.slot.lock();
            slot.generation += 1;
            slot.session = Some(session.id);

            let generation = slot.generation;
            let shared = Arc::clone(self);
            slot.status_task = Some(tokio::spawn(async move {
                shared.watch_status(generation, session.status).await;
            }));

            self.snapshot.send_modify(|snapshot| {
                snapshot.state = PlayerState::Playing;
                snapshot.track = Some(track.clone());
                snapshot.position = Duration::ZERO;
                snapshot.duration = Duration::ZERO;
            });
            generation
        };

        info!(generation, "Playback started");
        self.emit(PlaybackEvent::Started {
            owner_id: track.owner_id,
            title: track.display_name,
        });
    }

    /// Release the current session, if any. Must hold the command lock.
    async fn stop_current(&self) {
        let (session, task) = {
            let mut slot = self.slot.lock();
            slot.generation += 1;
            (slot.session.take(), slot.status_task.take())
        };

        if let Some(task) = task {
            task.abort();
        }

        let volume = self.snapshot.borrow().volume;
        let previous = self.snapshot.send_replace(PlaybackSnapshot {
            volume,
            ..PlaybackSnapshot::default()
        });

        if let Some(session) = session {
            if let Err(e) = self.adapter.unload(session).await {
                self.absorb("unload", e.into());
            }
        }

        if let Some(track) = previous.track {
            debug!(owner_id = %track.owner_id, "Playback stopped");
            self.emit(PlaybackEvent::Stopped {
                owner_id: track.owner_id,
            });
        }
    }

    async fn watch_status(
        self: Arc<Self>,
        generation: u64,
        mut status: mpsc::UnboundedReceiver<PlaybackStatus>,
    ) {
        while let Some(update) = status.recv().await {
            if update.did_just_finish {
                self.finish(generation).await;
                return;
            }

            if !self.apply_status(generation, update) {
                return;
            }
        }
        debug!(generation, "Status channel closed");
    }

    /// Returns `false` once the session has been superseded.
    fn apply_status(&self, generation: u64, update: PlaybackStatus) -> bool {
        let slot = self.slot.lock();
        if slot.generation != generation {
            return false;
        }

        let mut changed = None;
        self.snapshot.send_if_modified(|snapshot| {
            let duration = update.duration.unwrap_or(snapshot.duration);
            if snapshot.position == update.position && snapshot.duration == duration {
                return false;
            }
            snapshot.position = update.position;
            snapshot.duration = duration;
            changed = snapshot.owner_id().map(str::to_string);
            true
        });
        drop(slot);

        if let Some(owner_id) = changed {
            self.emit(PlaybackEvent::PositionChanged {
                owner_id,
                position_ms: update.position.as_millis() as u64,
                duration_ms: update.duration.unwrap_or_default().as_millis() as u64,
            });
        }
        true
    }

    /// Natural end of track.
    async fn finish(&self, generation: u64) {
        let _commands = self.commands.lock().await;

        let owner_id = self.snapshot.borrow().owner_id().map(str::to_string);

        if !self.config.auto_release_on_finish {
            let slot = self.slot.lock();
            if slot.generation != generation {
                return;
            }
            self.snapshot.send_modify(|snapshot| {
                snapshot.state = PlayerState::Paused;
                snapshot.position = snapshot.duration;
            });
            drop(slot);
        } else {
            let session = {
                let mut slot = self.slot.lock();
                if slot.generation != generation {
                    return;
                }
                slot.generation += 1;
                // Dropping our own handle detaches; the task ends right after.
                slot.status_task = None;
                slot.session.take()
            };

            self.snapshot.send_modify(|snapshot| {
                let volume = snapshot.volume;
                *snapshot = PlaybackSnapshot {
                    volume,
                    ..PlaybackSnapshot::default()
                };
            });

            if let Some(session) = session {
                if let Err(e) = self.adapter.unload(session).await {
                    self.absorb("unload", e.into());
                }
            }
        }

        if let Some(owner_id) = owner_id {
            info!(owner_id = %owner_id, "Track finished");
            self.emit(PlaybackEvent::Completed { owner_id });
        }
    }

    fn active_session(&self) -> Option<(PlaybackSessionId, String)> {
        let session = self.slot.lock().session?;
        let owner_id = self.snapshot.borrow().owner_id()?.to_string();
        Some((session, owner_id))
    }

    /// Apply a state transition and return the current position.
    fn transition(&self, next: fn(PlayerState) -> PlayerState) -> Duration {
        let mut position = Duration::ZERO;
        self.snapshot.send_modify(|snapshot| {
            snapshot.state = next(snapshot.state);
            position = snapshot.position;
        });
        position
    }

    fn absorb(&self, operation: &str, error: PlaybackError) {
        if error.is_released_session() {
            debug!(operation, error = %error, "Session already released");
        } else {
            warn!(operation, error = %error, "Playback adapter call failed");
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Playback(event));
        }
    }
}
