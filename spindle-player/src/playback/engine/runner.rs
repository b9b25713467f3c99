//! Control loop task and its handle
//!
//! The engine is owned by a single Tokio task. Commands, diagnostics
//! requests and shutdown arrive over an mpsc channel; a fixed-interval
//! ticker drives [`PlaybackEngine::tick`] between them.

use super::core::PlaybackEngine;
use super::diagnostics::EngineDiagnostics;
use crate::error::{Error, Result};
use spindle_common::commands::PlayerCommand;
use spindle_common::events::{EventBus, PlayerEvent};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::info;

const COMMAND_CHANNEL_CAPACITY: usize = 64;

enum EngineMessage {
    Command(PlayerCommand),
    Diagnostics(oneshot::Sender<EngineDiagnostics>),
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable handle to a running engine
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineMessage>,
    events: EventBus,
}

impl EngineHandle {
    /// Queue a command for the control loop
    pub async fn send(&self, command: PlayerCommand) -> Result<()> {
        self.tx
            .send(EngineMessage::Command(command))
            .await
            .map_err(|_| Error::ChannelClosed("playback control loop".to_string()))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub async fn diagnostics(&self) -> Result<EngineDiagnostics> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineMessage::Diagnostics(reply_tx))
            .await
            .map_err(|_| Error::ChannelClosed("playback control loop".to_string()))?;
        reply_rx
            .await
            .map_err(|_| Error::ChannelClosed("diagnostics reply".to_string()))
    }

    /// Stop playback, restore the system volume and end the control loop
    pub async fn shutdown(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(EngineMessage::Shutdown(ack_tx))
            .await
            .map_err(|_| Error::ChannelClosed("playback control loop".to_string()))?;
        ack_rx
            .await
            .map_err(|_| Error::ChannelClosed("shutdown acknowledgement".to_string()))
    }
}

/// Move the engine onto its own task
pub fn spawn_engine(engine: PlaybackEngine) -> (EngineHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let events = engine.events().clone();
    let task = tokio::spawn(run(engine, rx));
    (EngineHandle { tx, events }, task)
}

async fn run(mut engine: PlaybackEngine, mut rx: mpsc::Receiver<EngineMessage>) {
    let tick_interval = engine.settings().tick_interval;
    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!("Playback control loop started ({}ms tick)", tick_interval.as_millis());

    loop {
        tokio::select! {
            message = rx.recv() => {
                let now = Instant::now();
                match message {
                    Some(EngineMessage::Command(command)) => engine.handle_command(command, now),
                    Some(EngineMessage::Diagnostics(reply)) => {
                        let _ = reply.send(engine.diagnostics(now));
                    }
                    Some(EngineMessage::Shutdown(ack)) => {
                        engine.shutdown(now);
                        let _ = ack.send(());
                        break;
                    }
                    None => {
                        // every handle dropped
                        engine.shutdown(now);
                        break;
                    }
                }
            }
            _ = ticker.tick() => engine.tick(Instant::now()),
        }
    }

    info!("Playback control loop stopped");
}
