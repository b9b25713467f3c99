//! In-memory volume backend
//!
//! Keeps one level per sink name. Used by the standalone binary when no
//! system mixer is attached.

use super::VolumeBackend;
use crate::error::{Error, Result};
use std::collections::HashMap;

pub struct MemoryVolume {
    levels: HashMap<String, i32>,
    default_level: i32,
}

impl MemoryVolume {
    /// `default_level` is reported for sinks that were never set
    pub fn new(default_level: i32) -> Self {
        Self {
            levels: HashMap::new(),
            default_level: default_level.clamp(0, 100),
        }
    }
}

impl VolumeBackend for MemoryVolume {
    fn get(&mut self, sink: &str) -> Result<i32> {
        Ok(self.levels.get(sink).copied().unwrap_or(self.default_level))
    }

    fn set(&mut self, sink: &str, volume: i32) -> Result<()> {
        if !(0..=100).contains(&volume) {
            return Err(Error::Volume(format!("Volume out of range: {}", volume)));
        }
        self.levels.insert(sink.to_string(), volume);
        Ok(())
    }

    fn check_sink_changed(&mut self) -> bool {
        false
    }
}
