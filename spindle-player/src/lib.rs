//! # Spindle Player Library (spindle-player)
//!
//! DJ playback engine: prepares upcoming items ahead of play, plays them
//! through a pluggable backend with gaps, fade-in and shaped fade-out, and
//! reports state changes and periodic status to the scheduler.
//!
//! **Architecture:** A single control-loop task owns the
//! [`PlaybackEngine`](playback::PlaybackEngine); preparation runs on
//! blocking worker threads; events fan out over a broadcast bus.

pub mod backend;
pub mod config;
pub mod error;
pub mod playback;

pub use error::{Error, Result};
