//! Test helper modules for Spindle Player integration tests
//!
//! - backends: scriptable player, volume and preparer fakes
//! - rig: engine construction and explicit-clock driving

#![allow(dead_code)]

pub mod backends;
pub mod rig;

pub use backends::{FailingPreparer, FakePlayerState, GatedPreparer, InstantPreparer};
pub use rig::{announcement, begins, finishes, play, quiet_settings, states, track, wait_for, Rig};
