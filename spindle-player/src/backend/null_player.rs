//! Simulated player backend
//!
//! Plays nothing. Tracks a position from the wall clock and reports
//! `Stopped` once the simulated duration has elapsed, which is enough to run
//! the whole engine without an audio library.

use super::{BackendState, Capabilities, PlayerBackend};
use crate::error::{Error, Result};
use spindle_common::commands::SourceKind;
use tokio::time::Instant;
use tracing::debug;

/// Time-based stand-in for a real player
pub struct SimulatedPlayer {
    state: BackendState,
    media: Option<String>,
    duration_ms: i64,
    /// Position accumulated up to the last pause/seek
    base_position_ms: i64,
    /// Set while the clock is running
    running_since: Option<Instant>,
    rate_percent: i32,
    capabilities: Capabilities,
}

impl SimulatedPlayer {
    pub fn new(duration_ms: i64, capabilities: Capabilities) -> Self {
        Self {
            state: BackendState::Idle,
            media: None,
            duration_ms: duration_ms.max(0),
            base_position_ms: 0,
            running_since: None,
            rate_percent: 100,
            capabilities,
        }
    }

    /// Currently loaded media reference
    pub fn media(&self) -> Option<&str> {
        self.media.as_deref()
    }

    fn position_at(&self, now: Instant) -> i64 {
        let running = self
            .running_since
            .map(|since| {
                let real_ms = now.saturating_duration_since(since).as_millis() as i64;
                real_ms * self.rate_percent as i64 / 100
            })
            .unwrap_or(0);
        self.base_position_ms + running
    }

    fn freeze_clock(&mut self) {
        self.base_position_ms = self.position_at(Instant::now());
        self.running_since = None;
    }
}

impl PlayerBackend for SimulatedPlayer {
    fn set_media(&mut self, local_ref: &str, full_ref: Option<&str>, kind: SourceKind) -> Result<()> {
        if local_ref.is_empty() {
            return Err(Error::Backend("Empty media reference".to_string()));
        }
        debug!(
            "Simulated media: {} (full ref {:?}, kind {:?})",
            local_ref, full_ref, kind
        );
        self.media = Some(local_ref.to_string());
        self.state = BackendState::Stopped;
        self.base_position_ms = 0;
        self.running_since = None;
        Ok(())
    }

    fn play(&mut self, start_ms: i64, speed_percent: i32) -> Result<()> {
        if self.media.is_none() {
            return Err(Error::Backend("No media loaded".to_string()));
        }
        self.base_position_ms = start_ms.max(0);
        self.rate_percent = if self.capabilities.supports_speed {
            speed_percent.max(1)
        } else {
            100
        };
        // Reports Opening until the next state query
        self.state = BackendState::Opening;
        self.running_since = None;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        if self.state == BackendState::Playing {
            self.freeze_clock();
            self.state = BackendState::Paused;
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        if self.state == BackendState::Paused {
            self.running_since = Some(Instant::now());
            self.state = BackendState::Playing;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.state = BackendState::Stopped;
        self.base_position_ms = 0;
        self.running_since = None;
        Ok(())
    }

    fn seek(&mut self, position_ms: i64) -> i64 {
        if !self.capabilities.supports_seek {
            return self.query_position();
        }
        let position = position_ms.clamp(0, self.duration_ms);
        self.base_position_ms = position;
        if self.running_since.is_some() {
            self.running_since = Some(Instant::now());
        }
        position
    }

    fn set_rate(&mut self, percent: i32) -> i32 {
        if !self.capabilities.supports_speed {
            return self.rate_percent;
        }
        if self.running_since.is_some() {
            self.freeze_clock();
            self.running_since = Some(Instant::now());
        }
        self.rate_percent = percent.max(1);
        self.rate_percent
    }

    fn query_state(&mut self) -> BackendState {
        match self.state {
            BackendState::Opening => {
                self.running_since = Some(Instant::now());
                self.state = BackendState::Playing;
            }
            BackendState::Playing => {
                if self.position_at(Instant::now()) >= self.duration_ms {
                    debug!("Simulated media reached its end");
                    self.freeze_clock();
                    self.state = BackendState::Stopped;
                }
            }
            _ => {}
        }
        self.state
    }

    fn query_duration(&mut self) -> i64 {
        self.duration_ms
    }

    fn query_position(&mut self) -> i64 {
        self.position_at(Instant::now()).min(self.duration_ms)
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
}
