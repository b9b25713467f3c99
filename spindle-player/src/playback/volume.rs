//! Volume composition and the system volume controller
//!
//! Four levels are tracked:
//!
//! - **user**: what the user sees and sets (0-100)
//! - **base**: the user volume snapshotted when the current item started,
//!   restored by "reset volume"
//! - **real**: the user volume with the item's adjustment applied, clamped
//! - **actual**: the real volume with the fade multiplier applied; the value
//!   last written to the volume backend
//!
//! The adjustment percentage is frozen when an item starts. The fade term is
//! only present while a fade runs. Mute forces the backend to 0 without
//! touching the other levels.

use crate::backend::VolumeBackend;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Clamp to the 0-100 range
pub fn limit(volume: i32) -> i32 {
    volume.clamp(0, 100)
}

/// User volume with a relative adjustment applied
pub fn adjusted(user_volume: i32, adjust_percent: f64) -> i32 {
    let scaled = (user_volume as f64 * (1.0 + adjust_percent / 100.0)).round();
    limit(scaled.clamp(i32::MIN as f64, i32::MAX as f64) as i32)
}

/// Volume sent to the backend for the given inputs
///
/// Pure, so composing the same inputs twice yields the same level, and
/// monotonic in `fade_index`.
pub fn compose(user_volume: i32, adjust_percent: f64, fade_index: f64, mute: bool) -> i32 {
    if mute {
        return 0;
    }
    faded(adjusted(user_volume, adjust_percent), fade_index)
}

/// Real volume scaled by a fade index, never above the real volume
pub fn faded(real_volume: i32, fade_index: f64) -> i32 {
    let level = (real_volume as f64 * fade_index.clamp(0.0, 1.0)).round() as i32;
    level.min(real_volume).max(0)
}

/// Snapshot of the volume levels
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeLevels {
    pub user: i32,
    pub base: i32,
    pub real: i32,
    pub actual: i32,
    pub mute: bool,
}

/// Owns the volume backend and the volume state for the process lifetime
pub struct VolumeController {
    backend: Box<dyn VolumeBackend>,
    sink: String,
    user: i32,
    base: i32,
    real: i32,
    actual: i32,
    mute: bool,
    adjust_percent: f64,
    original_system_volume: Option<i32>,
}

impl VolumeController {
    /// Take over the backend
    ///
    /// Records the current system level so it can be restored on shutdown,
    /// then applies the start-up volume: the system level itself when
    /// `use_system_volume` is set, otherwise `default_volume`.
    pub fn new(
        mut backend: Box<dyn VolumeBackend>,
        sink: impl Into<String>,
        default_volume: i32,
        use_system_volume: bool,
    ) -> Self {
        let sink = sink.into();
        let original = match backend.get(&sink) {
            Ok(level) => Some(limit(level)),
            Err(e) => {
                warn!("Could not read system volume on sink '{}': {}", sink, e);
                None
            }
        };
        info!("Original system volume: {:?}", original);

        let user = match (use_system_volume, original) {
            (true, Some(level)) => level,
            _ => limit(default_volume),
        };

        let mut controller = Self {
            backend,
            sink,
            user,
            base: user,
            real: user,
            actual: user,
            mute: false,
            adjust_percent: 0.0,
            original_system_volume: original,
        };
        controller.write(user);
        controller
    }

    pub fn levels(&self) -> VolumeLevels {
        VolumeLevels {
            user: self.user,
            base: self.base,
            real: self.real,
            actual: self.actual,
            mute: self.mute,
        }
    }

    pub fn user(&self) -> i32 {
        self.user
    }

    pub fn base(&self) -> i32 {
        self.base
    }

    pub fn real(&self) -> i32 {
        self.real
    }

    pub fn actual(&self) -> i32 {
        self.actual
    }

    pub fn is_muted(&self) -> bool {
        self.mute
    }

    pub fn sink(&self) -> &str {
        &self.sink
    }

    pub fn original_system_volume(&self) -> Option<i32> {
        self.original_system_volume
    }

    /// Freeze the item's adjustment and compute the real volume
    pub fn begin_item(&mut self, adjust_percent: f64) {
        self.adjust_percent = adjust_percent;
        self.base = self.user;
        self.real = adjusted(self.user, adjust_percent);
        debug!(
            "Item volume: user {} adjust {:+.1}% real {}",
            self.user, adjust_percent, self.real
        );
    }

    /// Output the real volume (no fade)
    pub fn apply_real(&mut self) {
        if !self.mute {
            self.write(self.real);
        }
    }

    /// Output the real volume scaled by `fade_index`; returns the faded level
    pub fn apply_fade(&mut self, fade_index: f64) -> i32 {
        let level = faded(self.real, fade_index);
        if !self.mute {
            self.write(level);
        }
        level
    }

    /// Output silence (fade-out finished)
    pub fn silence(&mut self) {
        self.write(0);
    }

    /// Output silence for an inter-item gap; the real volume is recomputed
    /// when the next item starts
    pub fn silence_for_gap(&mut self) {
        self.real = 0;
        self.write(0);
    }

    /// Set the user volume; the difference is applied to the real volume too
    ///
    /// While `fading`, the backend is left alone and the next fade step
    /// writes the new real volume scaled by its index.
    pub fn set_user(&mut self, volume: i32, fading: bool) {
        let diff = limit(volume) - self.user;
        self.user = limit(self.user + diff);
        self.real = limit(self.real + diff);
        info!("Volume set: user {} real {}", self.user, self.real);
        if !self.mute && !fading {
            self.write(self.real);
        }
    }

    /// Restore the user volume captured when the item started
    pub fn reset(&mut self, fading: bool) {
        let base = self.base;
        self.set_user(base, fading);
    }

    /// Toggle mute; returns the new mute state
    ///
    /// Unmuting during a fade waits for the next fade step.
    pub fn toggle_mute(&mut self, fading: bool) -> bool {
        self.mute = !self.mute;
        if self.mute {
            self.write(0);
        } else if !fading {
            self.write(self.real);
        }
        info!("Mute: {}", self.mute);
        self.mute
    }

    /// Fold an external change of the system level into real and user
    ///
    /// Returns the applied difference (0 when nothing changed or muted).
    pub fn reconcile(&mut self) -> i32 {
        if self.mute {
            return 0;
        }
        let level = match self.backend.get(&self.sink) {
            Ok(level) => limit(level),
            Err(e) => {
                warn!("System volume check failed: {}", e);
                return 0;
            }
        };
        let diff = level - self.real;
        if diff != 0 {
            self.real = limit(self.real + diff);
            self.user = limit(self.user + diff);
            self.actual = level;
            info!(
                "System volume changed externally by {:+}: user {} real {}",
                diff, self.user, self.real
            );
        }
        diff
    }

    /// Re-apply the current level when the output sink changed
    pub fn follow_sink_change(&mut self) -> bool {
        if !self.backend.check_sink_changed() {
            return false;
        }
        info!("Audio sink changed, re-applying volume {}", self.actual);
        let level = if self.mute { 0 } else { self.actual };
        self.write(level);
        true
    }

    /// Write the system level recorded at start-up back
    pub fn restore_original(&mut self) {
        if let Some(level) = self.original_system_volume {
            info!("Restoring original system volume {}", level);
            if let Err(e) = self.backend.set(&self.sink, level) {
                warn!("Failed to restore system volume: {}", e);
            }
        }
    }

    fn write(&mut self, level: i32) {
        let level = limit(level);
        match self.backend.set(&self.sink, level) {
            Ok(()) => self.actual = level,
            Err(e) => warn!("Failed to set volume {} on sink '{}': {}", level, self.sink, e),
        }
    }
}
