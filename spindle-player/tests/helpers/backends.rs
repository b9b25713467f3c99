//! Scriptable backends for driving the engine without audio
//!
//! Each fake keeps its state behind an `Arc<Mutex<..>>` so the test can
//! inspect and steer it while the engine owns the backend.

use spindle_common::commands::SourceKind;
use spindle_player::backend::{
    BackendState, Capabilities, PlayerBackend, SourcePreparer, VolumeBackend,
};
use spindle_player::{Error, Result};
use std::sync::{Arc, Condvar, Mutex};

/// Observable state of a [`FakePlayer`]
#[derive(Debug)]
pub struct FakePlayerState {
    pub backend_state: BackendState,
    pub media: Option<String>,
    pub full_ref: Option<String>,
    /// (local_ref, start_ms, speed_percent) for every play call
    pub plays: Vec<(String, i64, i32)>,
    pub stops: usize,
    pub pauses: usize,
    pub resumes: usize,
    pub seeks: Vec<i64>,
    pub rate: i32,
    pub duration_ms: i64,
    pub position_ms: i64,
    /// Opening switches to Playing on the first state query
    pub auto_play: bool,
    /// Opening switches to Error on the first state query
    pub fail_open: bool,
    pub capabilities: Capabilities,
}

impl Default for FakePlayerState {
    fn default() -> Self {
        Self {
            backend_state: BackendState::Idle,
            media: None,
            full_ref: None,
            plays: Vec::new(),
            stops: 0,
            pauses: 0,
            resumes: 0,
            seeks: Vec::new(),
            rate: 100,
            duration_ms: 0,
            position_ms: 0,
            auto_play: true,
            fail_open: false,
            capabilities: Capabilities::default(),
        }
    }
}

pub struct FakePlayer {
    state: Arc<Mutex<FakePlayerState>>,
}

impl FakePlayer {
    pub fn new() -> (Self, Arc<Mutex<FakePlayerState>>) {
        let state = Arc::new(Mutex::new(FakePlayerState::default()));
        (Self { state: state.clone() }, state)
    }
}

impl PlayerBackend for FakePlayer {
    fn set_media(&mut self, local_ref: &str, full_ref: Option<&str>, _kind: SourceKind) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        s.media = Some(local_ref.to_string());
        s.full_ref = full_ref.map(str::to_string);
        Ok(())
    }

    fn play(&mut self, start_ms: i64, speed_percent: i32) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        let media = s.media.clone().unwrap_or_default();
        s.plays.push((media, start_ms, speed_percent));
        s.rate = speed_percent;
        s.position_ms = start_ms;
        s.backend_state = BackendState::Opening;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        s.pauses += 1;
        s.backend_state = BackendState::Paused;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        s.resumes += 1;
        s.backend_state = BackendState::Playing;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        s.stops += 1;
        s.backend_state = BackendState::Stopped;
        Ok(())
    }

    fn seek(&mut self, position_ms: i64) -> i64 {
        let mut s = self.state.lock().unwrap();
        s.seeks.push(position_ms);
        s.position_ms = position_ms;
        position_ms
    }

    fn set_rate(&mut self, percent: i32) -> i32 {
        let mut s = self.state.lock().unwrap();
        s.rate = percent;
        percent
    }

    fn query_state(&mut self) -> BackendState {
        let mut s = self.state.lock().unwrap();
        if s.backend_state == BackendState::Opening {
            if s.fail_open {
                s.backend_state = BackendState::Error;
            } else if s.auto_play {
                s.backend_state = BackendState::Playing;
            }
        }
        s.backend_state
    }

    fn query_duration(&mut self) -> i64 {
        self.state.lock().unwrap().duration_ms
    }

    fn query_position(&mut self) -> i64 {
        self.state.lock().unwrap().position_ms
    }

    fn capabilities(&self) -> Capabilities {
        self.state.lock().unwrap().capabilities
    }
}

/// Observable state of a [`FakeVolume`]
#[derive(Debug, Default)]
pub struct FakeVolumeState {
    /// The "system" level; tests change it to simulate external changes
    pub level: i32,
    pub writes: Vec<i32>,
    pub sink_changed: bool,
}

pub struct FakeVolume {
    state: Arc<Mutex<FakeVolumeState>>,
}

impl FakeVolume {
    pub fn new(level: i32) -> (Self, Arc<Mutex<FakeVolumeState>>) {
        let state = Arc::new(Mutex::new(FakeVolumeState {
            level,
            ..Default::default()
        }));
        (Self { state: state.clone() }, state)
    }
}

impl VolumeBackend for FakeVolume {
    fn get(&mut self, _sink: &str) -> Result<i32> {
        Ok(self.state.lock().unwrap().level)
    }

    fn set(&mut self, _sink: &str, volume: i32) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        s.level = volume;
        s.writes.push(volume);
        Ok(())
    }

    fn check_sink_changed(&mut self) -> bool {
        std::mem::take(&mut self.state.lock().unwrap().sink_changed)
    }
}

/// Prepares immediately and records cleanups
#[derive(Default)]
pub struct InstantPreparer {
    pub cleanups: Mutex<Vec<String>>,
}

impl InstantPreparer {
    pub fn local_ref(source_ref: &str) -> String {
        format!("/prepared/{}", source_ref)
    }

    pub fn cleaned(&self) -> Vec<String> {
        self.cleanups.lock().unwrap().clone()
    }
}

impl SourcePreparer for InstantPreparer {
    fn prepare(&self, source_ref: &str) -> Result<String> {
        Ok(Self::local_ref(source_ref))
    }

    fn cleanup(&self, _source_ref: &str, local_ref: &str) {
        self.cleanups.lock().unwrap().push(local_ref.to_string());
    }
}

/// Holds every preparation until [`GatedPreparer::open`] is called
#[derive(Default)]
pub struct GatedPreparer {
    open: Mutex<bool>,
    cond: Condvar,
    pub cleanups: Mutex<Vec<String>>,
}

impl GatedPreparer {
    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cond.notify_all();
    }

    pub fn cleaned(&self) -> Vec<String> {
        self.cleanups.lock().unwrap().clone()
    }
}

impl SourcePreparer for GatedPreparer {
    fn prepare(&self, source_ref: &str) -> Result<String> {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cond.wait(open).unwrap();
        }
        Ok(InstantPreparer::local_ref(source_ref))
    }

    fn cleanup(&self, _source_ref: &str, local_ref: &str) {
        self.cleanups.lock().unwrap().push(local_ref.to_string());
    }
}

/// Fails every preparation
pub struct FailingPreparer;

impl SourcePreparer for FailingPreparer {
    fn prepare(&self, source_ref: &str) -> Result<String> {
        Err(Error::Preparation {
            source_ref: source_ref.to_string(),
            reason: "source unreadable".to_string(),
        })
    }

    fn cleanup(&self, _source_ref: &str, _local_ref: &str) {}
}
