//! Status reporting and diagnostics snapshots

use super::core::PlaybackEngine;
use crate::backend::BackendState;
use crate::playback::volume::VolumeLevels;
use serde::Serialize;
use spindle_common::commands::ItemKind;
use spindle_common::events::{PlayerEvent, PlayerState};
use spindle_common::FadeShape;
use tokio::time::Instant;

/// The item on the backend
#[derive(Debug, Clone, Serialize)]
pub struct CurrentItemInfo {
    pub unique_id: i64,
    pub source_ref: String,
    pub duration_ms: i64,
    pub kind: ItemKind,
}

/// Point-in-time view of the engine for the diagnostics command
#[derive(Debug, Clone, Serialize)]
pub struct EngineDiagnostics {
    pub state: PlayerState,
    pub backend_state: BackendState,
    pub current: Option<CurrentItemInfo>,
    pub elapsed_ms: i64,
    pub speed: i32,
    pub repeat: bool,
    pub pause_at_end: bool,
    pub volume: VolumeLevels,
    pub sink: String,
    pub gap_ms: i64,
    pub fade_in_ms: i64,
    pub fade_out_ms: i64,
    pub fade_shape: FadeShape,
    pub fading: bool,
    pub play_requests: usize,
    pub prep_pending: usize,
    pub prep_in_flight: usize,
    pub prepared: usize,
}

impl PlaybackEngine {
    /// Emit a PlayerStatus event
    ///
    /// Unless `forced`, a report that would repeat the last one is skipped
    /// outside of Playing/InFadeout, where the elapsed time keeps moving.
    pub(super) fn send_status(&mut self, forced: bool, now: Instant) {
        self.next_status = now + self.settings.status_interval;

        let moving = matches!(self.state, PlayerState::Playing | PlayerState::InFadeout);
        if !forced && !moving && self.last_status_state == Some(self.state) {
            return;
        }
        self.last_status_state = Some(self.state);

        let duration_ms = match self.state {
            PlayerState::Stopped | PlayerState::InGap => 0,
            _ => self.current.as_ref().map_or(0, |item| item.duration_ms),
        };

        self.emit(PlayerEvent::PlayerStatus {
            repeat: self.repeat,
            pause_at_end: self.pause_at_end,
            user_volume: self.volume.user(),
            speed: self.current_speed,
            base_volume: self.volume.base(),
            elapsed_ms: self.elapsed_ms(now),
            duration_ms,
        });
    }

    /// Snapshot of the engine and its backends
    pub fn diagnostics(&mut self, now: Instant) -> EngineDiagnostics {
        EngineDiagnostics {
            state: self.state,
            backend_state: self.player.query_state(),
            current: self.current.as_ref().map(|item| CurrentItemInfo {
                unique_id: item.unique_id,
                source_ref: item.source_ref.clone(),
                duration_ms: item.duration_ms,
                kind: item.kind,
            }),
            elapsed_ms: self.elapsed_ms(now),
            speed: self.current_speed,
            repeat: self.repeat,
            pause_at_end: self.pause_at_end,
            volume: self.volume.levels(),
            sink: self.volume.sink().to_string(),
            gap_ms: self.gap_ms,
            fade_in_ms: self.fade_in_ms,
            fade_out_ms: self.fade_out_ms,
            fade_shape: self.fade_shape,
            fading: self.fader.is_some(),
            play_requests: self.requests.count(),
            prep_pending: self.prep.pending_count(),
            prep_in_flight: self.prep.in_flight_count(),
            prepared: self.prep.prepared_count(),
        }
    }
}
