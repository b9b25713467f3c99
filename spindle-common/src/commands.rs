//! Inbound command types
//!
//! Commands sent by the scheduler (and forwarded UI actions) to the player.
//! Serialized with an internal `command` tag so they can be carried as
//! newline-delimited JSON or over any message transport.

use crate::fade_curves::FadeShape;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Kind of playable item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Normal track: fades, gaps, repeat all apply
    #[default]
    Track,
    /// Spoken interlude: never repeated, never faded, never followed by a gap
    Announcement,
}

/// Where the audio resource lives
///
/// Network resources need the fully-qualified source reference handed to the
/// backend in addition to the prepared local reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    LocalFile,
    Network,
}

/// Prepare request as sent by the scheduler
///
/// Durations and offsets are already normalized for the item's speed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepareRequest {
    /// Scheduler-assigned id, not reused while the item is outstanding
    pub unique_id: i64,
    /// Logical track or announcement reference
    pub source_ref: String,
    pub duration_ms: i64,
    #[serde(default)]
    pub start_offset_ms: i64,
    #[serde(default = "default_speed")]
    pub speed_percent: i32,
    /// Signed relative volume adjustment (percent)
    #[serde(default)]
    pub volume_adjust_percent: f64,
    #[serde(default)]
    pub kind: ItemKind,
    #[serde(default)]
    pub source_kind: SourceKind,
}

fn default_speed() -> i32 {
    100
}

/// Commands accepted by the player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PlayerCommand {
    /// Start preparing an item ahead of play
    PrepareTrack(PrepareRequest),
    /// Discard a pending or prepared item
    ClearPrep { unique_id: i64, source_ref: String },
    /// Discard every pending, in-flight and prepared item
    ClearPrepQueue,
    /// Queue a prepared item for playback
    PlayTrack { unique_id: i64, source_ref: String },
    Play,
    Pause,
    PlayPause,
    Stop,
    NextSong,
    Fade,
    /// Toggle repeat
    Repeat,
    /// Toggle pause-at-end
    PauseAtEnd,
    /// Seek within the current item (speed-adjusted milliseconds)
    Seek { position_ms: i64 },
    /// Restart the current item from its start offset
    SongBegin,
    SetSpeed { percent: i32 },
    SetVolume { volume: i32 },
    /// Restore the user volume to the value it had when the item started
    ResetVolume,
    /// Toggle mute
    Mute,
    SetGapMs { gap_ms: i64 },
    SetFadeInMs { fade_in_ms: i64 },
    SetFadeOutMs { fade_out_ms: i64 },
    SetFadeShape { shape: FadeShape },
}

impl PlayerCommand {
    /// Parse a command from one line of JSON
    pub fn from_json(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line.trim())?)
    }

    /// Short command name for logging
    pub fn name(&self) -> &'static str {
        match self {
            PlayerCommand::PrepareTrack(_) => "prepare_track",
            PlayerCommand::ClearPrep { .. } => "clear_prep",
            PlayerCommand::ClearPrepQueue => "clear_prep_queue",
            PlayerCommand::PlayTrack { .. } => "play_track",
            PlayerCommand::Play => "play",
            PlayerCommand::Pause => "pause",
            PlayerCommand::PlayPause => "play_pause",
            PlayerCommand::Stop => "stop",
            PlayerCommand::NextSong => "next_song",
            PlayerCommand::Fade => "fade",
            PlayerCommand::Repeat => "repeat",
            PlayerCommand::PauseAtEnd => "pause_at_end",
            PlayerCommand::Seek { .. } => "seek",
            PlayerCommand::SongBegin => "song_begin",
            PlayerCommand::SetSpeed { .. } => "set_speed",
            PlayerCommand::SetVolume { .. } => "set_volume",
            PlayerCommand::ResetVolume => "reset_volume",
            PlayerCommand::Mute => "mute",
            PlayerCommand::SetGapMs { .. } => "set_gap_ms",
            PlayerCommand::SetFadeInMs { .. } => "set_fade_in_ms",
            PlayerCommand::SetFadeOutMs { .. } => "set_fade_out_ms",
            PlayerCommand::SetFadeShape { .. } => "set_fade_shape",
        }
    }
}
