//! Engine test rig
//!
//! Builds a [`PlaybackEngine`] on fake backends and drives it with explicit
//! instants, so timing-dependent behavior is deterministic.

use super::backends::{FakePlayer, FakePlayerState, FakeVolume, FakeVolumeState};
use spindle_common::commands::{ItemKind, PlayerCommand, PrepareRequest, SourceKind};
use spindle_common::events::{EventBus, PlayerEvent, PlayerState};
use spindle_player::backend::SourcePreparer;
use spindle_player::playback::{Backends, EngineSettings, PlaybackEngine};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Settings with no gap, no fades and a 100-volume system level
pub fn quiet_settings() -> EngineSettings {
    EngineSettings {
        gap_ms: 0,
        fade_in_ms: 0,
        fade_out_ms: 0,
        default_volume: 100,
        use_system_volume: false,
        ..EngineSettings::default()
    }
}

pub struct Rig {
    pub engine: PlaybackEngine,
    pub player: Arc<Mutex<FakePlayerState>>,
    pub volume: Arc<Mutex<FakeVolumeState>>,
    pub events: broadcast::Receiver<PlayerEvent>,
    /// Test clock origin
    pub t0: Instant,
}

impl Rig {
    /// Must run inside a Tokio runtime
    pub fn new(settings: EngineSettings, preparer: Arc<dyn SourcePreparer>) -> Self {
        Self::with_system_volume(settings, preparer, 50)
    }

    pub fn with_system_volume(
        settings: EngineSettings,
        preparer: Arc<dyn SourcePreparer>,
        system_volume: i32,
    ) -> Self {
        let (player, player_state) = FakePlayer::new();
        let (volume, volume_state) = FakeVolume::new(system_volume);
        let bus = EventBus::new(1024);
        let events = bus.subscribe();
        let engine = PlaybackEngine::new(
            settings,
            Backends {
                player: Box::new(player),
                volume: Box::new(volume),
                preparer,
            },
            bus,
        )
        .expect("engine");

        Self {
            engine,
            player: player_state,
            volume: volume_state,
            events,
            t0: Instant::now(),
        }
    }

    /// Instant `ms` after the test clock origin
    pub fn at(&self, ms: u64) -> Instant {
        self.t0 + Duration::from_millis(ms)
    }

    pub fn command(&mut self, command: PlayerCommand, ms: u64) {
        let now = self.at(ms);
        self.engine.handle_command(command, now);
    }

    pub fn tick(&mut self, ms: u64) {
        let now = self.at(ms);
        self.engine.tick(now);
    }

    /// Tick every `step` ms over `[from, to]`
    pub fn run(&mut self, from: u64, to: u64, step: u64) {
        let mut ms = from;
        while ms <= to {
            self.tick(ms);
            ms += step;
        }
    }

    /// Let the preparation workers finish, polling at the origin instant
    pub async fn settle(&mut self) {
        for _ in 0..1000 {
            self.engine.tick(self.t0);
            let queue = self.engine.prep_queue();
            if queue.pending_count() == 0 && queue.in_flight_count() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("preparations did not settle");
    }

    pub fn drain(&mut self) -> Vec<PlayerEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    pub fn volume_level(&self) -> i32 {
        self.volume.lock().unwrap().level
    }

    pub fn set_backend_state(&self, state: spindle_player::backend::BackendState) {
        self.player.lock().unwrap().backend_state = state;
    }
}

pub fn track(unique_id: i64, source_ref: &str, duration_ms: i64) -> PrepareRequest {
    PrepareRequest {
        unique_id,
        source_ref: source_ref.to_string(),
        duration_ms,
        start_offset_ms: 0,
        speed_percent: 100,
        volume_adjust_percent: 0.0,
        kind: ItemKind::Track,
        source_kind: SourceKind::LocalFile,
    }
}

pub fn announcement(unique_id: i64, source_ref: &str, duration_ms: i64) -> PrepareRequest {
    PrepareRequest {
        kind: ItemKind::Announcement,
        ..track(unique_id, source_ref, duration_ms)
    }
}

pub fn play(unique_id: i64, source_ref: &str) -> PlayerCommand {
    PlayerCommand::PlayTrack {
        unique_id,
        source_ref: source_ref.to_string(),
    }
}

/// (unique_id, has_history, pause_requested) of every PlaybackFinish
pub fn finishes(events: &[PlayerEvent]) -> Vec<(Option<i64>, bool, bool)> {
    events
        .iter()
        .filter_map(|e| match e {
            PlayerEvent::PlaybackFinish {
                unique_id,
                has_history,
                pause_requested,
                ..
            } => Some((*unique_id, *has_history, *pause_requested)),
            _ => None,
        })
        .collect()
}

pub fn begins(events: &[PlayerEvent]) -> Vec<i64> {
    events
        .iter()
        .filter_map(|e| match e {
            PlayerEvent::PlaybackBegin { unique_id, .. } => Some(*unique_id),
            _ => None,
        })
        .collect()
}

/// (state, is_new_track) of every PlayerState event
pub fn states(events: &[PlayerEvent]) -> Vec<(PlayerState, bool)> {
    events
        .iter()
        .filter_map(|e| match e {
            PlayerEvent::PlayerState {
                state,
                is_new_track,
            } => Some((*state, *is_new_track)),
            _ => None,
        })
        .collect()
}

/// Poll `condition` with real sleeps until it holds or ~2s pass
pub async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
