//! Event types for the Spindle event system
//!
//! Provides the player event definitions and the EventBus used to deliver
//! them to the scheduler and any attached UI.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Playback state machine states
///
/// `Stopped` is the initial state and the terminal state of every item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    /// Nothing loaded; ready to start the next request
    Stopped,
    /// Media handed to the backend, waiting for it to report playing
    Loading,
    /// Backend is playing the current item
    Playing,
    /// Backend is paused on the current item
    Paused,
    /// Fade-out in progress; item stops when the fade completes
    InFadeout,
    /// Silence between two tracks
    InGap,
}

impl PlayerState {
    /// True while an item is loaded on the backend
    pub fn has_current_item(&self) -> bool {
        matches!(
            self,
            PlayerState::Loading | PlayerState::Playing | PlayerState::Paused | PlayerState::InFadeout
        )
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerState::Stopped => write!(f, "stopped"),
            PlayerState::Loading => write!(f, "loading"),
            PlayerState::Playing => write!(f, "playing"),
            PlayerState::Paused => write!(f, "paused"),
            PlayerState::InFadeout => write!(f, "in_fadeout"),
            PlayerState::InGap => write!(f, "in_gap"),
        }
    }
}

/// Player event types
///
/// Emitted by the playback engine on state transitions and on the status
/// heartbeat. Serialized with an internal `type` tag for transmission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Player state changed
    PlayerState {
        /// State after the change
        state: PlayerState,
        /// True when a newly claimed item (not a repeat) starts loading
        is_new_track: bool,
    },

    /// Periodic status report
    ///
    /// Sent on every state change and every status interval (default 250ms)
    /// while playing or fading out.
    PlayerStatus {
        repeat: bool,
        pause_at_end: bool,
        /// Volume shown to the user (0-100)
        user_volume: i32,
        /// Current playback speed percentage
        speed: i32,
        /// User volume snapshotted at the start of the current item
        base_volume: i32,
        /// Elapsed play time of the current item (milliseconds)
        elapsed_ms: i64,
        /// Duration of the current item (0 when stopped or in the gap)
        duration_ms: i64,
    },

    /// A track has started playing (announcements are not reported)
    PlaybackBegin {
        unique_id: i64,
        source_ref: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The current item finished, was skipped, or could not be played
    PlaybackFinish {
        /// Item the finish applies to, if one was current
        unique_id: Option<i64>,
        /// Whether the item should be credited to the play history
        has_history: bool,
        /// A pause was requested for the end of this item; the scheduler
        /// should not start the next one
        pause_requested: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Pause-at-end toggle changed
    PauseAtEndState { on: bool },
}

impl PlayerEvent {
    /// Short event name for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            PlayerEvent::PlayerState { .. } => "PlayerState",
            PlayerEvent::PlayerStatus { .. } => "PlayerStatus",
            PlayerEvent::PlaybackBegin { .. } => "PlaybackBegin",
            PlayerEvent::PlaybackFinish { .. } => "PlaybackFinish",
            PlayerEvent::PauseAtEndState { .. } => "PauseAtEndState",
        }
    }
}

/// Event distribution bus for player events
///
/// Uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block the control loop)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    pub fn emit(
        &self,
        event: PlayerEvent,
    ) -> Result<usize, broadcast::error::SendError<PlayerEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
