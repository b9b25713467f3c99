//! # Spindle Common Library
//!
//! Shared code for the Spindle playback engine and its callers:
//! - Event types emitted by the player (`PlayerEvent`) and the `EventBus`
//! - Inbound command types (`PlayerCommand`, `PrepareRequest`)
//! - Fade shape catalogue and the fade index calculation
//! - Configuration file discovery
//! - Common error type

pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod fade_curves;

pub use error::{Error, Result};
pub use fade_curves::FadeShape;
