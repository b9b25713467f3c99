//! Command handling
//!
//! Commands that do not apply in the current state are ignored.

use super::core::{PlayTimers, PlaybackEngine};
use super::playback::{after, normalize_position, END_CHECK_LEAD_MS};
use crate::playback::types::{PlayRequest, PrepItem};
use spindle_common::commands::{PlayerCommand, PrepareRequest};
use spindle_common::events::{PlayerEvent, PlayerState};
use tokio::time::Instant;
use tracing::{debug, info, warn};

impl PlaybackEngine {
    /// Apply one command at `now`
    pub fn handle_command(&mut self, command: PlayerCommand, now: Instant) {
        debug!("Command: {}", command.name());

        match command {
            PlayerCommand::PrepareTrack(request) => self.prepare(request),
            PlayerCommand::ClearPrep {
                unique_id,
                source_ref,
            } => self.clear_prep(unique_id, &source_ref),
            PlayerCommand::ClearPrepQueue => {
                self.prep.clear_all();
                self.failed_preps.clear();
            }
            PlayerCommand::PlayTrack {
                unique_id,
                source_ref,
            } => {
                debug!(
                    "Play request {} {} (queued {})",
                    unique_id,
                    source_ref,
                    self.requests.count() + 1
                );
                self.requests.push(PlayRequest::new(unique_id, source_ref));
            }
            PlayerCommand::Play => self.play(now),
            PlayerCommand::Pause => self.pause(now),
            PlayerCommand::PlayPause => {
                if matches!(self.state, PlayerState::Playing | PlayerState::InFadeout) {
                    self.pause(now);
                } else {
                    self.play(now);
                }
            }
            PlayerCommand::Stop => self.stop(now),
            PlayerCommand::NextSong => self.next_song(now),
            PlayerCommand::Fade => self.fade(now),
            PlayerCommand::Repeat => {
                self.repeat = !self.repeat;
                info!("Repeat: {}", self.repeat);
                self.send_status(true, now);
            }
            PlayerCommand::PauseAtEnd => {
                self.pause_at_end = !self.pause_at_end;
                info!("Pause at end: {}", self.pause_at_end);
                self.emit(PlayerEvent::PauseAtEndState {
                    on: self.pause_at_end,
                });
            }
            PlayerCommand::Seek { position_ms } => self.seek(position_ms, now),
            PlayerCommand::SongBegin => self.song_begin(now),
            PlayerCommand::SetSpeed { percent } => self.set_speed(percent),
            PlayerCommand::SetVolume { volume } => {
                let fading = self.is_fading();
                self.volume.set_user(volume, fading);
            }
            PlayerCommand::ResetVolume => {
                let fading = self.is_fading();
                self.volume.reset(fading);
            }
            PlayerCommand::Mute => {
                let fading = self.is_fading();
                self.volume.toggle_mute(fading);
            }
            PlayerCommand::SetGapMs { gap_ms } => {
                self.gap_ms = gap_ms.max(0);
                info!("Gap: {}ms", self.gap_ms);
            }
            PlayerCommand::SetFadeInMs { fade_in_ms } => {
                self.fade_in_ms = fade_in_ms.max(0);
                info!("Fade-in: {}ms", self.fade_in_ms);
            }
            PlayerCommand::SetFadeOutMs { fade_out_ms } => {
                self.fade_out_ms = fade_out_ms.max(0);
                info!("Fade-out: {}ms", self.fade_out_ms);
            }
            PlayerCommand::SetFadeShape { shape } => {
                self.fade_shape = shape;
                info!("Fade shape: {}", shape);
            }
        }
    }

    fn prepare(&mut self, request: PrepareRequest) {
        let item = PrepItem::from(request);
        self.failed_preps
            .retain(|f| !f.matches(item.unique_id, &item.source_ref));
        self.prep.prepare(item);
    }

    fn clear_prep(&mut self, unique_id: i64, source_ref: &str) {
        self.failed_preps.retain(|f| !f.matches(unique_id, source_ref));
        if !self.prep.clear(unique_id, source_ref) {
            debug!("Prep clear: {} {} not queued", unique_id, source_ref);
        }
    }

    fn play(&mut self, now: Instant) {
        if self.state == PlayerState::InGap && self.gap_until.is_some() {
            debug!("Gap cancelled");
            self.gap_until = Some(now);
        }
        if self.state != PlayerState::Paused {
            return;
        }
        if let Err(e) = self.player.resume() {
            warn!("Backend resume failed: {}", e);
            return;
        }
        self.set_check_times(now);
        self.set_state(PlayerState::Playing, false, now);
    }

    fn pause(&mut self, now: Instant) {
        if self
            .current
            .as_ref()
            .is_some_and(|item| item.is_announcement())
        {
            debug!("Announcements cannot be paused");
            return;
        }

        match self.state {
            PlayerState::InFadeout => {
                if !self.pause_at_end {
                    self.pause_at_end = true;
                    info!("Pause requested during fade-out: pausing at end");
                    self.emit(PlayerEvent::PauseAtEndState { on: true });
                }
            }
            PlayerState::Playing => {
                self.timers.played_ms = self.elapsed_ms(now);
                self.timers.started = None;
                if let Err(e) = self.player.pause() {
                    warn!("Backend pause failed: {}", e);
                }
                self.set_state(PlayerState::Paused, false, now);
                if self.fader.as_ref().is_some_and(|f| f.is_fade_in()) {
                    self.fader = None;
                    self.volume.apply_real();
                }
            }
            _ => {}
        }
    }

    /// Stop playback without a finish report
    ///
    /// The request of the stopped item is dropped. Later requests stay
    /// queued; the scheduler clears them if playback should stay stopped.
    fn stop(&mut self, now: Instant) {
        if self.state == PlayerState::Stopped {
            return;
        }

        let owns_head = self.state.has_current_item()
            || (self.state == PlayerState::InGap && self.repeat && self.current.is_some());
        if owns_head {
            self.requests.pop_front();
        }

        if let Err(e) = self.player.stop() {
            warn!("Backend stop failed: {}", e);
        }
        if let Some(item) = self.current.take() {
            info!("Stopped {} {}", item.unique_id, item.source_ref);
            self.prep.release(item);
        }
        self.fader = None;
        self.gap_until = None;
        self.timers = PlayTimers::default();
        self.current_speed = 100;
        self.stop_playing = false;
        self.skip_history = false;
        self.suppress_gap = false;
        if self.pause_at_end {
            self.pause_at_end = false;
            self.emit(PlayerEvent::PauseAtEndState { on: false });
        }
        self.set_state(PlayerState::Stopped, false, now);
    }

    fn next_song(&mut self, now: Instant) {
        self.repeat = false;
        self.suppress_gap = true;

        match self.state {
            PlayerState::Loading
            | PlayerState::Playing
            | PlayerState::InGap
            | PlayerState::InFadeout => {
                self.skip_history = true;
                self.stop_playing = true;
                if self.gap_until.is_some() {
                    self.gap_until = Some(now);
                }
            }
            PlayerState::Paused => {
                self.requests.pop_front();
                if let Err(e) = self.player.stop() {
                    warn!("Backend stop failed: {}", e);
                }
                let item = self.current.take();
                self.fader = None;
                self.timers = PlayTimers::default();
                self.current_speed = 100;
                self.set_state(PlayerState::Stopped, false, now);
                self.emit_finish(item.as_ref().map(|i| i.unique_id), false, false);
                if let Some(item) = item {
                    self.prep.release(item);
                }
            }
            PlayerState::Stopped => {
                self.suppress_gap = false;
                self.emit_finish(None, false, false);
            }
        }
    }

    fn fade(&mut self, now: Instant) {
        if self.state != PlayerState::Playing {
            return;
        }
        if self.current.as_ref().map_or(true, |item| item.is_announcement()) {
            return;
        }

        self.check_system_volume(now);
        if self.fade_out_ms == 0 {
            self.stop_playing = true;
            return;
        }

        let span = self.start_fade_out(now);
        self.timers.end_check = Some(after(now, span));
        self.timers.time_check = Some(after(now, span - END_CHECK_LEAD_MS));
    }

    fn seek(&mut self, position_ms: i64, now: Instant) {
        if !matches!(self.state, PlayerState::Playing | PlayerState::Paused) {
            return;
        }
        if !self.player.capabilities().supports_seek {
            debug!("Backend cannot seek");
            return;
        }
        let Some(item) = self.current.as_ref() else {
            return;
        };

        let position_ms = position_ms.clamp(0, item.duration_ms.max(0));
        let target = normalize_position(position_ms, item.speed_percent) + item.start_offset_ms;
        let reached = self.player.seek(target);
        debug!("Seek to {}ms (media {}ms, reached {}ms)", position_ms, target, reached);

        self.timers.played_ms = position_ms;
        self.set_check_times(now);
        self.send_status(true, now);
    }

    fn song_begin(&mut self, now: Instant) {
        if self
            .current
            .as_ref()
            .map_or(true, |item| item.is_announcement())
        {
            return;
        }
        self.seek(0, now);
    }

    fn set_speed(&mut self, percent: i32) {
        if self.state != PlayerState::Playing || !self.player.capabilities().supports_speed {
            debug!("Speed change ignored in {}", self.state);
            return;
        }
        self.current_speed = self.player.set_rate(percent.max(1));
        info!("Speed: {}%", self.current_speed);
    }
}
