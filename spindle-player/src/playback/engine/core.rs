//! Core playback engine - construction, tick orchestration and lifecycle
//!
//! **Responsibilities:**
//! - PlaybackEngine struct definition and initialization
//! - The per-tick processing order
//! - Accessors and shutdown

use crate::backend::{PlayerBackend, SourcePreparer, VolumeBackend};
use crate::config::PlayerConfig;
use crate::error::{Error, Result};
use crate::playback::fader::FadeRun;
use crate::playback::prep_queue::{PrepFailure, PrepQueue};
use crate::playback::request_queue::{ClaimRetry, PlayRequestQueue, RetryPolicy};
use crate::playback::types::PrepItem;
use crate::playback::volume::VolumeController;
use spindle_common::events::{EventBus, PlayerState};
use spindle_common::FadeShape;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Preparation failures remembered for play requests that arrive later
const FAILED_PREP_MEMORY: usize = 64;

/// Engine tunables and initial playback settings
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub tick_interval: Duration,
    pub status_interval: Duration,
    pub volume_check_interval: Duration,
    pub max_concurrent_preps: usize,
    pub claim_retry: RetryPolicy,
    pub event_capacity: usize,
    pub default_volume: i32,
    pub use_system_volume: bool,
    pub audio_sink: String,
    pub gap_ms: i64,
    pub fade_in_ms: i64,
    pub fade_out_ms: i64,
    pub fade_shape: FadeShape,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&PlayerConfig::default())
    }
}

impl From<&PlayerConfig> for EngineSettings {
    fn from(config: &PlayerConfig) -> Self {
        let engine = &config.engine;
        let playback = &config.playback;
        Self {
            tick_interval: Duration::from_millis(engine.tick_interval_ms),
            status_interval: Duration::from_millis(engine.status_interval_ms),
            volume_check_interval: Duration::from_millis(engine.volume_check_interval_ms),
            max_concurrent_preps: engine.max_concurrent_preps,
            claim_retry: RetryPolicy {
                limit: engine.claim_retry_limit,
                initial_backoff: Duration::from_millis(engine.claim_retry_initial_backoff_ms),
                max_backoff: Duration::from_millis(engine.claim_retry_max_backoff_ms),
            },
            event_capacity: engine.event_capacity,
            default_volume: playback.default_volume,
            use_system_volume: playback.use_system_volume,
            audio_sink: playback.audio_sink.clone(),
            gap_ms: playback.gap_ms,
            fade_in_ms: playback.fade_in_ms,
            fade_out_ms: playback.fade_out_ms,
            fade_shape: config.fade_shape(),
        }
    }
}

/// The injected collaborators
pub struct Backends {
    pub player: Box<dyn PlayerBackend>,
    pub volume: Box<dyn VolumeBackend>,
    pub preparer: Arc<dyn SourcePreparer>,
}

/// Timing of the current item
///
/// `played_ms` accumulates play time up to the last pause or seek;
/// `started` marks when the clock last (re)started.
#[derive(Debug, Default)]
pub(super) struct PlayTimers {
    pub(super) started: Option<Instant>,
    pub(super) played_ms: i64,
    /// Hard end of the item
    pub(super) end_check: Option<Instant>,
    /// From here on the backend is asked whether playback ended
    pub(super) time_check: Option<Instant>,
    /// Fade-out start
    pub(super) fade_check: Option<Instant>,
}

/// Playback state machine
///
/// Owns every piece of playback state. Driven by [`tick`] and
/// [`handle_command`], both of which take the current instant so the
/// engine never reads the clock itself.
///
/// [`tick`]: PlaybackEngine::tick
/// [`handle_command`]: PlaybackEngine::handle_command
pub struct PlaybackEngine {
    pub(super) settings: EngineSettings,
    pub(super) player: Box<dyn PlayerBackend>,
    pub(super) volume: VolumeController,
    pub(super) prep: PrepQueue,
    pub(super) requests: PlayRequestQueue,
    pub(super) claim_retry: ClaimRetry,
    pub(super) failed_preps: Vec<PrepFailure>,
    pub(super) events: EventBus,

    pub(super) state: PlayerState,
    /// State reported by the last status message
    pub(super) last_status_state: Option<PlayerState>,
    pub(super) current: Option<PrepItem>,
    pub(super) current_speed: i32,

    pub(super) repeat: bool,
    pub(super) pause_at_end: bool,
    /// Finish the current item at the next check
    pub(super) stop_playing: bool,
    /// The finish of the current item earns no history credit
    pub(super) skip_history: bool,
    /// No gap after the next track finish
    pub(super) suppress_gap: bool,

    pub(super) gap_ms: i64,
    pub(super) fade_in_ms: i64,
    pub(super) fade_out_ms: i64,
    pub(super) fade_shape: FadeShape,

    pub(super) fader: Option<FadeRun>,
    pub(super) timers: PlayTimers,
    pub(super) gap_until: Option<Instant>,
    pub(super) next_status: Instant,
    pub(super) next_volume_check: Instant,
}

impl PlaybackEngine {
    /// Create the engine
    ///
    /// Must be called from within a Tokio runtime: preparation workers run
    /// on that runtime's blocking pool.
    pub fn new(settings: EngineSettings, backends: Backends, events: EventBus) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::InvalidState(format!("No Tokio runtime for preparation workers: {}", e)))?;

        let volume = VolumeController::new(
            backends.volume,
            settings.audio_sink.clone(),
            settings.default_volume,
            settings.use_system_volume,
        );
        let prep = PrepQueue::new(backends.preparer, settings.max_concurrent_preps, runtime);
        let now = Instant::now();

        info!(
            "Playback engine created: gap {}ms, fade-in {}ms, fade-out {}ms ({}), {} preparation workers",
            settings.gap_ms,
            settings.fade_in_ms,
            settings.fade_out_ms,
            settings.fade_shape,
            settings.max_concurrent_preps
        );

        Ok(Self {
            player: backends.player,
            volume,
            prep,
            requests: PlayRequestQueue::new(),
            claim_retry: ClaimRetry::new(settings.claim_retry),
            failed_preps: Vec::new(),
            events,
            state: PlayerState::Stopped,
            last_status_state: None,
            current: None,
            current_speed: 100,
            repeat: false,
            pause_at_end: false,
            stop_playing: false,
            skip_history: false,
            suppress_gap: false,
            gap_ms: settings.gap_ms.max(0),
            fade_in_ms: settings.fade_in_ms.max(0),
            fade_out_ms: settings.fade_out_ms.max(0),
            fade_shape: settings.fade_shape,
            fader: None,
            timers: PlayTimers::default(),
            gap_until: None,
            next_status: now,
            next_volume_check: now + settings.volume_check_interval,
            settings,
        })
    }

    /// One pass of the control loop
    ///
    /// Order: preparation results, status heartbeat, fade step, gap expiry,
    /// start of the next item, load completion, system volume check,
    /// fade-out start and end-of-item detection.
    pub fn tick(&mut self, now: Instant) {
        self.poll_preparations();

        if now >= self.next_status {
            self.send_status(false, now);
        }

        if self.fader.as_ref().is_some_and(|f| f.is_due(now)) {
            self.fade_step();
        }

        if self.state == PlayerState::InGap && self.gap_until.is_some_and(|t| now >= t) {
            self.gap_until = None;
            debug!("Gap finished");
            self.set_state(PlayerState::Stopped, false, now);
        }

        if self.state == PlayerState::Stopped
            && self.gap_until.is_none()
            && !self.requests.is_empty()
        {
            self.start_next(now);
        }

        if self.state == PlayerState::Loading {
            self.check_loading(now);
        }

        if self.state == PlayerState::Playing && now >= self.next_volume_check {
            self.check_system_volume(now);
        }

        if matches!(self.state, PlayerState::Playing | PlayerState::InFadeout) {
            self.check_playing(now);
        }
    }

    fn poll_preparations(&mut self) {
        let outcome = self.prep.poll();
        if let Some(head) = self.requests.front() {
            if outcome.completed.contains(&head.unique_id) {
                self.claim_retry.expedite();
            }
        }
        for failure in outcome.failed {
            self.failed_preps
                .retain(|f| !f.matches(failure.unique_id, &failure.source_ref));
            self.failed_preps.push(failure);
        }
        if self.failed_preps.len() > FAILED_PREP_MEMORY {
            let excess = self.failed_preps.len() - FAILED_PREP_MEMORY;
            self.failed_preps.drain(..excess);
        }
    }

    /// Stop everything and hand the system volume back
    pub fn shutdown(&mut self, now: Instant) {
        info!("Playback engine shutting down");
        if let Err(e) = self.player.stop() {
            warn!("Backend stop failed during shutdown: {}", e);
        }
        if let Some(item) = self.current.take() {
            self.prep.release(item);
        }
        self.fader = None;
        self.gap_until = None;
        self.timers = PlayTimers::default();
        self.requests.clear();
        self.claim_retry.reset();
        self.prep.clear_all();
        self.volume.restore_original();
        self.set_state(PlayerState::Stopped, false, now);
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn current_item(&self) -> Option<&PrepItem> {
        self.current.as_ref()
    }

    pub fn current_speed(&self) -> i32 {
        self.current_speed
    }

    pub fn repeat(&self) -> bool {
        self.repeat
    }

    pub fn pause_at_end(&self) -> bool {
        self.pause_at_end
    }

    pub fn volume(&self) -> &VolumeController {
        &self.volume
    }

    pub fn prep_queue(&self) -> &PrepQueue {
        &self.prep
    }

    pub fn play_request_count(&self) -> usize {
        self.requests.count()
    }

    pub fn gap_ms(&self) -> i64 {
        self.gap_ms
    }

    pub fn fade_in_ms(&self) -> i64 {
        self.fade_in_ms
    }

    pub fn fade_out_ms(&self) -> i64 {
        self.fade_out_ms
    }

    pub fn fade_shape(&self) -> FadeShape {
        self.fade_shape
    }

    pub fn is_fading(&self) -> bool {
        self.fader.is_some()
    }

    /// Play time of the current item at `now`
    pub fn elapsed_ms(&self, now: Instant) -> i64 {
        match self.state {
            PlayerState::Paused => self.timers.played_ms,
            PlayerState::Playing | PlayerState::InFadeout => {
                let running = self
                    .timers
                    .started
                    .map(|t| now.saturating_duration_since(t).as_millis() as i64)
                    .unwrap_or(0);
                self.timers.played_ms + running
            }
            _ => 0,
        }
    }
}
