//! # Event Bus System
//!
//! Broadcasts cache and playback notifications through `tokio::sync::broadcast`
//! so UI layers and diagnostics can observe the core without being wired into
//! it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   emit    ┌───────────┐
//! │ OfflineCache     ├──────────>│           │   subscribe   ┌────────────┐
//! │ Manager          │           │ EventBus  ├──────────────>│ Subscriber │
//! └──────────────────┘           │ (broadcast│               └────────────┘
//! ┌──────────────────┐   emit    │  channel) │   subscribe   ┌────────────┐
//! │ Playback         ├──────────>│           ├──────────────>│ Subscriber │
//! │ Controller       │           └───────────┘               └────────────┘
//! └──────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Cache(CacheEvent::Removed {
//!         owner_id: "g1".to_string(),
//!     }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Cache(_)));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   Download progress is chatty, so slow subscribers should expect this.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Emitting with no subscribers returns an error; publishers ignore it.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Offline cache events
    Cache(CacheEvent),
    /// Playback events
    Playback(PlaybackEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Cache(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Cache(CacheEvent::DownloadFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Cache(CacheEvent::BulkFinished { failed, .. }) if *failed > 0 => {
                EventSeverity::Warning
            }
            CoreEvent::Cache(CacheEvent::DownloadCompleted { .. })
            | CoreEvent::Cache(CacheEvent::BulkFinished { .. })
            | CoreEvent::Cache(CacheEvent::Cleared { .. }) => EventSeverity::Info,
            CoreEvent::Playback(PlaybackEvent::Started { .. })
            | CoreEvent::Playback(PlaybackEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Cache Events
// ============================================================================

/// Events emitted by the offline cache manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    /// A download for an owner has been accepted and marked in flight.
    DownloadStarted { owner_id: String },
    /// Incremental progress, as a fraction in `[0, 1]`.
    DownloadProgress { owner_id: String, fraction: f64 },
    /// The file is on disk and the index has been persisted.
    DownloadCompleted {
        owner_id: String,
        /// Measured size in bytes.
        file_size: u64,
    },
    /// The download failed; any previously cached record is untouched.
    DownloadFailed { owner_id: String, message: String },
    /// A cached record and its file were removed.
    Removed { owner_id: String },
    /// Every record in the namespace was removed.
    Cleared {
        namespace: String,
        /// Number of records dropped.
        removed: usize,
    },
    /// A bulk download started.
    BulkStarted { total: usize },
    /// A bulk download ended, either exhausted or cancelled.
    BulkFinished {
        downloaded: usize,
        failed: usize,
        cancelled: bool,
    },
}

impl CacheEvent {
    fn description(&self) -> &str {
        match self {
            CacheEvent::DownloadStarted { .. } => "Download started",
            CacheEvent::DownloadProgress { .. } => "Download progress",
            CacheEvent::DownloadCompleted { .. } => "Download completed",
            CacheEvent::DownloadFailed { .. } => "Download failed",
            CacheEvent::Removed { .. } => "Cached file removed",
            CacheEvent::Cleared { .. } => "Offline cache cleared",
            CacheEvent::BulkStarted { .. } => "Bulk download started",
            CacheEvent::BulkFinished { .. } => "Bulk download finished",
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events related to audio playback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// Playback started.
    Started {
        /// The owner whose track is playing.
        owner_id: String,
        /// Track display name.
        title: String,
    },
    /// Playback paused.
    Paused {
        owner_id: String,
        /// Position when paused (milliseconds).
        position_ms: u64,
    },
    /// Playback resumed after pause.
    Resumed {
        owner_id: String,
        /// Position when resumed (milliseconds).
        position_ms: u64,
    },
    /// Playback stopped and the resource was released.
    Stopped { owner_id: String },
    /// Track finished playing naturally.
    Completed { owner_id: String },
    /// Playback position changed (seek or natural progression).
    PositionChanged {
        owner_id: String,
        /// New position (milliseconds).
        position_ms: u64,
        /// Track duration (milliseconds), zero while unknown.
        duration_ms: u64,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::Completed { .. } => "Track completed",
            PlaybackEvent::PositionChanged { .. } => "Playback position changed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// When a subscriber falls behind by more than `capacity` events it
    /// receives `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let playback_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Playback(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn removed(owner_id: &str) -> CoreEvent {
        CoreEvent::Cache(CacheEvent::Removed {
            owner_id: owner_id.to_string(),
        })
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(removed("g1")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        assert_eq!(bus.emit(removed("g1")).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), removed("g1"));
        assert_eq!(sub2.recv().await.unwrap(), removed("g1"));
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Playback(_)));

        bus.emit(removed("g1")).unwrap();
        bus.emit(CoreEvent::Playback(PlaybackEvent::Stopped {
            owner_id: "g2".to_string(),
        }))
        .unwrap();

        let event = stream.recv().await.unwrap();
        assert_eq!(
            event,
            CoreEvent::Playback(PlaybackEvent::Stopped {
                owner_id: "g2".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(removed(&format!("g{}", i))).unwrap();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(3))));
        assert_eq!(sub.recv().await.unwrap(), removed("g3"));
    }

    #[test]
    fn test_event_severity() {
        let failed = CoreEvent::Cache(CacheEvent::DownloadFailed {
            owner_id: "g1".to_string(),
            message: "HTTP 404".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Warning);

        let partial = CoreEvent::Cache(CacheEvent::BulkFinished {
            downloaded: 1,
            failed: 1,
            cancelled: false,
        });
        assert_eq!(partial.severity(), EventSeverity::Warning);

        let clean = CoreEvent::Cache(CacheEvent::BulkFinished {
            downloaded: 2,
            failed: 0,
            cancelled: false,
        });
        assert_eq!(clean.severity(), EventSeverity::Info);

        let progress = CoreEvent::Cache(CacheEvent::DownloadProgress {
            owner_id: "g1".to_string(),
            fraction: 0.5,
        });
        assert_eq!(progress.severity(), EventSeverity::Debug);
        assert!(EventSeverity::Debug < EventSeverity::Error);
    }

    #[test]
    fn test_event_description() {
        assert_eq!(removed("g1").description(), "Cached file removed");
        let completed = CoreEvent::Playback(PlaybackEvent::Completed {
            owner_id: "g1".to_string(),
        });
        assert_eq!(completed.description(), "Track completed");
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Cache(CacheEvent::DownloadCompleted {
            owner_id: "g1".to_string(),
            file_size: 1024,
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Cache\""));
        assert!(json.contains("\"event\":\"DownloadCompleted\""));

        let back: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[tokio::test]
    async fn test_try_recv() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());
        assert!(stream.try_recv().is_none());

        bus.emit(removed("g1")).unwrap();
        assert_eq!(stream.try_recv().unwrap().unwrap(), removed("g1"));
    }
}
