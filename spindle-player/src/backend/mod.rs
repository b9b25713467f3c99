//! External collaborators of the playback engine
//!
//! The engine drives three capability-set traits, injected at construction:
//!
//! - [`PlayerBackend`]: loads and plays one media resource at a time
//! - [`VolumeBackend`]: reads and writes the system volume of a sink
//! - [`SourcePreparer`]: turns a source reference into a playable local
//!   resource (runs on preparation worker threads)
//!
//! Bundled implementations: [`SimulatedPlayer`] (time-based, no audio),
//! [`MemoryVolume`] (in-process level store) and [`FilePreparer`] (local
//! file materialization into a temp folder).

pub mod file_preparer;
pub mod null_player;
pub mod null_volume;

pub use file_preparer::FilePreparer;
pub use null_player::SimulatedPlayer;
pub use null_volume::MemoryVolume;

use crate::error::Result;
use serde::Serialize;
use spindle_common::commands::SourceKind;

/// State reported by a player backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendState {
    /// No media loaded
    Idle,
    Opening,
    Buffering,
    Playing,
    Paused,
    /// Playback ended or was stopped
    Stopped,
    Error,
}

impl BackendState {
    /// Playback of the loaded media is over (normally or not)
    pub fn is_finished(&self) -> bool {
        matches!(self, BackendState::Stopped | BackendState::Error)
    }
}

/// Optional operations a backend supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub supports_seek: bool,
    pub supports_speed: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            supports_seek: true,
            supports_speed: true,
        }
    }
}

/// Audio playback backend
///
/// All calls are expected to return promptly; completion of asynchronous
/// work (opening, buffering) is observed through [`query_state`].
///
/// [`query_state`]: PlayerBackend::query_state
pub trait PlayerBackend: Send {
    /// Load media. `full_ref` carries the fully-qualified source for
    /// network resources.
    fn set_media(&mut self, local_ref: &str, full_ref: Option<&str>, kind: SourceKind)
        -> Result<()>;

    /// Start playback of the loaded media at `start_ms` with `speed_percent`
    fn play(&mut self, start_ms: i64, speed_percent: i32) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    fn resume(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    /// Seek to `position_ms`; returns the position actually reached
    fn seek(&mut self, position_ms: i64) -> i64;

    /// Change the playback rate; returns the rate actually applied
    fn set_rate(&mut self, percent: i32) -> i32;

    fn query_state(&mut self) -> BackendState;

    /// Media duration in milliseconds (0 if unknown)
    fn query_duration(&mut self) -> i64;

    /// Playback position in milliseconds
    fn query_position(&mut self) -> i64;

    fn capabilities(&self) -> Capabilities;
}

/// System volume backend
pub trait VolumeBackend: Send {
    /// Current level of `sink` (empty = default sink), 0-100
    fn get(&mut self, sink: &str) -> Result<i32>;

    fn set(&mut self, sink: &str, volume: i32) -> Result<()>;

    /// True once after the default output sink changed
    fn check_sink_changed(&mut self) -> bool;
}

/// Prepares source references into playable local resources
///
/// Called from preparation worker threads, so implementations must be
/// shareable. `prepare` may block (file copies, cache warming).
pub trait SourcePreparer: Send + Sync {
    /// Returns the local reference handed to the player backend
    fn prepare(&self, source_ref: &str) -> Result<String>;

    /// Remove whatever `prepare` created for this item
    fn cleanup(&self, source_ref: &str, local_ref: &str);
}
