//! Single shared audio player.

pub mod config;
pub mod controller;
pub mod state;

pub use config::PlayerConfig;
pub use controller::PlaybackController;
pub use state::{PlaybackSnapshot, PlaybackTrack, PlayerState};
