//! Player state machine.

use std::fmt;
use std::time::Duration;

/// Coarse state of the single shared player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    /// No resource is open.
    #[default]
    Idle,
    Playing,
    Paused,
}

impl PlayerState {
    /// State after `pause()`. Idle stays idle.
    pub fn pause(self) -> Self {
        match self {
            PlayerState::Playing | PlayerState::Paused => PlayerState::Paused,
            PlayerState::Idle => PlayerState::Idle,
        }
    }

    /// State after `resume()`. Idle stays idle.
    pub fn resume(self) -> Self {
        match self {
            PlayerState::Playing | PlayerState::Paused => PlayerState::Playing,
            PlayerState::Idle => PlayerState::Idle,
        }
    }

    pub fn is_idle(self) -> bool {
        self == PlayerState::Idle
    }

    pub fn is_playing(self) -> bool {
        self == PlayerState::Playing
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlayerState::Idle => "idle",
            PlayerState::Playing => "playing",
            PlayerState::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// The track currently loaded into the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackTrack {
    pub owner_id: String,
    pub display_name: String,
    pub file_name: String,
    /// Local `file://` URL, bare local path, or remote URL.
    pub uri: String,
}

impl PlaybackTrack {
    pub fn new(
        owner_id: impl Into<String>,
        display_name: impl Into<String>,
        file_name: impl Into<String>,
        uri: impl Into<String>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            display_name: display_name.into(),
            file_name: file_name.into(),
            uri: uri.into(),
        }
    }
}

/// Everything a UI needs to render the player.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaybackSnapshot {
    pub state: PlayerState,
    pub track: Option<PlaybackTrack>,
    pub position: Duration,
    pub duration: Duration,
    pub volume: f32,
}

impl PlaybackSnapshot {
    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    /// Owner of the current track, if any.
    pub fn owner_id(&self) -> Option<&str> {
        self.track.as_ref().map(|t| t.owner_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        assert_eq!(PlayerState::Idle.pause(), PlayerState::Idle);
        assert_eq!(PlayerState::Idle.resume(), PlayerState::Idle);
        assert_eq!(PlayerState::Playing.pause(), PlayerState::Paused);
        assert_eq!(PlayerState::Paused.resume(), PlayerState::Playing);
        assert_eq!(PlayerState::Paused.pause(), PlayerState::Paused);
    }

    #[test]
    fn test_snapshot_defaults_to_idle() {
        let snapshot = PlaybackSnapshot::default();
        assert!(snapshot.state.is_idle());
        assert!(!snapshot.is_playing());
        assert_eq!(snapshot.owner_id(), None);
        assert_eq!(PlayerState::Paused.to_string(), "paused");
    }
}
