//! Item lifecycle - start, load completion, fades, end detection and finish
//!
//! Everything here runs on the control loop from [`PlaybackEngine::tick`]
//! or from a command handler.

use super::core::{PlayTimers, PlaybackEngine};
use crate::playback::fader::FadeRun;
use crate::playback::request_queue::{next_item, NextItem, RetryDecision};
use crate::playback::types::PrepItem;
use spindle_common::events::{PlayerEvent, PlayerState};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// The backend is polled for the end of the item this long before the
/// computed end time
pub(super) const END_CHECK_LEAD_MS: i64 = 500;

/// `now + ms`, never earlier than `now`
pub(super) fn after(now: Instant, ms: i64) -> Instant {
    if ms <= 0 {
        now
    } else {
        now + Duration::from_millis(ms as u64)
    }
}

fn reached(deadline: Option<Instant>, now: Instant) -> bool {
    deadline.is_some_and(|t| now >= t)
}

/// Position within the media file for a play-time position at `speed_percent`
pub fn normalize_position(position_ms: i64, speed_percent: i32) -> i64 {
    (position_ms as f64 * speed_percent as f64 / 100.0).round() as i64
}

impl PlaybackEngine {
    /// Start the repeated current item or the item for the head request
    pub(super) fn start_next(&mut self, now: Instant) {
        let (item, is_new) = match next_item(self.repeat, self.current.as_ref()) {
            NextItem::Replay => match self.current.clone() {
                Some(item) => (item, false),
                None => return,
            },
            NextItem::ClaimHead => match self.claim_head(now) {
                Some(item) => (item, true),
                None => return,
            },
        };
        self.load_item(item, is_new, now);
    }

    fn claim_head(&mut self, now: Instant) -> Option<PrepItem> {
        let request = self.requests.front()?.clone();
        if !self.claim_retry.ready(&request, now) {
            return None;
        }

        if let Some(pos) = self
            .failed_preps
            .iter()
            .position(|f| f.matches(request.unique_id, &request.source_ref))
        {
            let failure = self.failed_preps.remove(pos);
            warn!(
                "Play request {} ({}) cannot start: preparation failed: {}",
                request.unique_id, request.source_ref, failure.reason
            );
            self.fail_head_request();
            return None;
        }

        if let Some(item) = self.prep.claim_match(request.unique_id, &request.source_ref) {
            self.claim_retry.reset();
            debug!("Claimed {} ({})", item.unique_id, item.source_ref);
            return Some(item);
        }

        match self.claim_retry.record_miss(&request, now) {
            RetryDecision::RetryAt(_) => {
                debug!(
                    "{} ({}) not prepared yet (attempt {})",
                    request.unique_id,
                    request.source_ref,
                    self.claim_retry.misses()
                );
            }
            RetryDecision::GiveUp => {
                warn!(
                    "Giving up on {} ({}) after {} claim attempts (still preparing: {})",
                    request.unique_id,
                    request.source_ref,
                    self.claim_retry.misses(),
                    self.prep.is_preparing(request.unique_id, &request.source_ref)
                );
                self.fail_head_request();
            }
        }
        None
    }

    /// Drop the head request and report it finished without history
    fn fail_head_request(&mut self) {
        let Some(request) = self.requests.pop_front() else {
            return;
        };
        self.claim_retry.reset();
        self.prep.clear(request.unique_id, &request.source_ref);
        self.emit_finish(Some(request.unique_id), false, false);
    }

    fn load_item(&mut self, item: PrepItem, is_new: bool, now: Instant) {
        if is_new {
            if let Some(previous) = self.current.take() {
                self.prep.release(previous);
            }
            self.current_speed = item.speed_percent;
        }

        self.volume.begin_item(item.volume_adjust_percent);
        if !item.is_announcement() && self.fade_in_ms > 0 {
            // ramps up from silence once the backend reports playing
            self.volume.silence();
        } else {
            self.volume.apply_real();
        }

        info!(
            "Play: {} {} ({}ms from {}ms at {}%){}",
            item.unique_id,
            item.source_ref,
            item.duration_ms,
            item.start_offset_ms,
            self.current_speed,
            if is_new { "" } else { " repeat" }
        );

        self.fader = None;
        self.timers = PlayTimers::default();
        let result = self
            .player
            .set_media(&item.local_ref, item.full_ref(), item.source_kind)
            .and_then(|()| self.player.play(item.start_offset_ms, self.current_speed));
        self.current = Some(item);

        if let Err(e) = result {
            error!("Backend failed to start media: {}", e);
            self.abandon_current(now);
            return;
        }
        self.set_state(PlayerState::Loading, is_new, now);
    }

    /// Loading: wait for the backend to report playing
    pub(super) fn check_loading(&mut self, now: Instant) {
        let backend_state = self.player.query_state();
        if backend_state.is_finished() {
            warn!("Backend could not open the media ({:?})", backend_state);
            self.abandon_current(now);
            return;
        }
        if backend_state != crate::backend::BackendState::Playing {
            return;
        }

        let Some(item) = self.current.as_mut() else {
            self.set_state(PlayerState::Stopped, false, now);
            return;
        };
        if item.duration_ms <= 1 {
            item.duration_ms = self.player.query_duration();
            info!("Duration from backend: {}ms", item.duration_ms);
        }
        let is_track = !item.is_announcement();
        let unique_id = item.unique_id;
        let source_ref = item.source_ref.clone();

        self.timers.played_ms = 0;
        self.set_check_times(now);

        if is_track && self.fade_in_ms > 0 {
            self.fader = Some(FadeRun::fade_in(self.fade_in_ms, now));
            self.fade_step();
        }

        self.set_state(PlayerState::Playing, false, now);

        if is_track {
            self.emit(PlayerEvent::PlaybackBegin {
                unique_id,
                source_ref,
                timestamp: chrono::Utc::now(),
            });
        }
    }

    /// Restart the item clock at `now` and derive the check deadlines from
    /// the remaining play time
    pub(super) fn set_check_times(&mut self, now: Instant) {
        let Some(item) = self.current.as_ref() else {
            return;
        };
        let remaining = item.duration_ms - self.timers.played_ms;
        let fade_applies = !item.is_announcement() && self.fade_out_ms > 0;

        self.timers.started = Some(now);
        self.timers.end_check = Some(after(now, remaining));
        self.timers.time_check = Some(after(now, remaining - END_CHECK_LEAD_MS));
        self.timers.fade_check = Some(if fade_applies {
            after(now, remaining - self.fade_out_ms)
        } else {
            after(now, remaining)
        });
        self.next_volume_check = now + self.settings.volume_check_interval;
    }

    /// Playing or fading out: start the fade-out and detect the end
    pub(super) fn check_playing(&mut self, now: Instant) {
        let Some(item) = self.current.as_ref() else {
            warn!("{} without a current item", self.state);
            self.set_state(PlayerState::Stopped, false, now);
            return;
        };
        let is_track = !item.is_announcement();

        if is_track
            && self.fade_out_ms > 0
            && self.fader.is_none()
            && reached(self.timers.fade_check, now)
        {
            self.check_system_volume(now);
            self.start_fade_out(now);
        }

        if self.stop_playing || reached(self.timers.time_check, now) {
            let backend_state = self.player.query_state();
            let duration = self.player.query_duration();
            let position = self.player.query_position();
            if backend_state.is_finished()
                || self.stop_playing
                || (duration > 0 && position >= duration)
                || reached(self.timers.end_check, now)
            {
                self.finish_current(now);
            }
        }
    }

    /// Start the fade-out of the current item; returns its span in ms
    pub(super) fn start_fade_out(&mut self, now: Instant) -> i64 {
        let Some(item) = self.current.as_ref() else {
            return 0;
        };
        let remaining = item.duration_ms - self.elapsed_ms(now);
        let run = FadeRun::fade_out(remaining, self.fade_out_ms, self.fade_shape, now);
        info!(
            "Fade-out: {} steps ({}, {}ms left)",
            run.total_steps(),
            self.fade_shape,
            remaining
        );
        self.fader = Some(run);
        self.fade_step();
        self.set_state(PlayerState::InFadeout, false, now);
        remaining.min(self.fade_out_ms).max(0)
    }

    /// Execute one fade step
    pub(super) fn fade_step(&mut self) {
        let Some(run) = self.fader.as_mut() else {
            return;
        };
        if run.is_finished() {
            return;
        }
        let is_fade_in = run.is_fade_in();
        let step = run.step();
        let level = self.volume.apply_fade(step.index);
        debug!("Fade volume {} (index {:.3})", level, step.index);

        if is_fade_in {
            if level >= self.volume.real() {
                debug!("Fade-in complete");
                self.fader = None;
            }
        } else if step.finished {
            self.volume.silence();
            debug!("Fade-out complete");
        }
    }

    /// End the current item: events, request pop, gap and release
    pub(super) fn finish_current(&mut self, now: Instant) {
        let Some(item) = self.current.clone() else {
            self.set_state(PlayerState::Stopped, false, now);
            return;
        };
        let is_track = !item.is_announcement();
        let has_history = !self.skip_history;
        let played_ms = self.elapsed_ms(now);

        self.fader = None;
        if is_track {
            self.skip_history = false;
            self.stop_playing = false;
        }
        if !(self.repeat && is_track) {
            self.current_speed = 100;
        }
        if let Err(e) = self.player.stop() {
            warn!("Backend stop failed: {}", e);
        }
        info!(
            "Finished {} {} after {}ms (history: {})",
            item.unique_id, item.source_ref, played_ms, has_history
        );
        self.timers = PlayTimers::default();

        let mut gap_ms = if self.suppress_gap { 0 } else { self.gap_ms };
        if is_track {
            if self.pause_at_end {
                gap_ms = 0;
                self.pause_at_end = false;
                self.emit(PlayerEvent::PauseAtEndState { on: false });
                info!("Pausing at end of {}", item.unique_id);
                if self.repeat {
                    self.requests.pop_front();
                } else {
                    self.emit_finish(Some(item.unique_id), has_history, true);
                }
            } else if !self.repeat {
                self.emit_finish(Some(item.unique_id), has_history, false);
            }
        }
        if !is_track || !self.repeat {
            self.requests.pop_front();
        }

        if self.fade_out_ms == 0 {
            self.check_system_volume(now);
        }

        if is_track && gap_ms > 0 {
            self.volume.silence_for_gap();
            self.gap_until = Some(after(now, gap_ms));
            self.set_state(PlayerState::InGap, false, now);
        } else {
            self.set_state(PlayerState::Stopped, false, now);
        }

        if is_track {
            self.suppress_gap = false;
            if !self.repeat {
                if let Some(item) = self.current.take() {
                    self.prep.release(item);
                }
            }
        }
    }

    /// The backend could not play the current item
    fn abandon_current(&mut self, now: Instant) {
        let item = self.current.take();
        if let Err(e) = self.player.stop() {
            warn!("Backend stop failed: {}", e);
        }
        self.fader = None;
        self.timers = PlayTimers::default();
        self.current_speed = 100;
        self.skip_history = false;
        self.stop_playing = false;
        self.requests.pop_front();
        self.claim_retry.reset();

        self.emit_finish(item.as_ref().map(|i| i.unique_id), false, false);
        if let Some(item) = item {
            warn!("Could not play {} ({})", item.unique_id, item.source_ref);
            self.prep.release(item);
        }
        self.set_state(PlayerState::Stopped, false, now);
    }

    /// Follow sink changes and fold external volume changes into the levels
    pub(super) fn check_system_volume(&mut self, now: Instant) {
        self.next_volume_check = now + self.settings.volume_check_interval;
        self.volume.follow_sink_change();
        if self.fader.is_some() || self.state == PlayerState::InGap {
            return;
        }
        self.volume.reconcile();
    }

    pub(super) fn set_state(&mut self, new_state: PlayerState, is_new_track: bool, now: Instant) {
        if self.state == new_state {
            return;
        }
        info!("Player state: {} -> {}", self.state, new_state);
        self.state = new_state;
        self.emit(PlayerEvent::PlayerState {
            state: new_state,
            is_new_track,
        });
        self.send_status(false, now);
    }

    pub(super) fn emit(&self, event: PlayerEvent) {
        debug!("Event: {}", event.event_type());
        self.events.emit_lossy(event);
    }

    pub(super) fn emit_finish(&self, unique_id: Option<i64>, has_history: bool, pause_requested: bool) {
        self.emit(PlayerEvent::PlaybackFinish {
            unique_id,
            has_history,
            pause_requested,
            timestamp: chrono::Utc::now(),
        });
    }
}
