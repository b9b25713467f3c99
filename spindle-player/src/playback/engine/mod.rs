//! Playback engine
//!
//! **Module Structure:**
//! - `core.rs`: Struct, construction, tick orchestration, shutdown
//! - `playback.rs`: Item lifecycle (start, load, fades, end detection, finish)
//! - `commands.rs`: Command handling
//! - `diagnostics.rs`: Status heartbeat and diagnostics snapshots
//! - `runner.rs`: Control loop task and [`EngineHandle`]

mod commands;
mod core;
mod diagnostics;
mod playback;
mod runner;

pub use self::core::{Backends, EngineSettings, PlaybackEngine};
pub use diagnostics::{CurrentItemInfo, EngineDiagnostics};
pub use playback::normalize_position;
pub use runner::{spawn_engine, EngineHandle};
