//! Control loop task tests (real time, short items)

mod helpers;

use helpers::*;
use spindle_common::commands::PlayerCommand;
use spindle_common::events::{PlayerEvent, PlayerState};
use spindle_player::playback::spawn_engine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;

async fn next_finish(rx: &mut broadcast::Receiver<PlayerEvent>) -> Option<PlayerEvent> {
    loop {
        match rx.recv().await {
            Ok(event @ PlayerEvent::PlaybackFinish { .. }) => return Some(event),
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

#[tokio::test]
async fn test_commands_flow_through_control_loop() {
    let rig = Rig::new(quiet_settings(), Arc::new(InstantPreparer::default()));
    let (handle, task) = spawn_engine(rig.engine);
    let mut rx = handle.subscribe();

    handle
        .send(PlayerCommand::PrepareTrack(track(1, "a.mp3", 300)))
        .await
        .unwrap();
    handle.send(play(1, "a.mp3")).await.unwrap();

    let finish = timeout(Duration::from_secs(5), next_finish(&mut rx))
        .await
        .expect("finish within timeout")
        .expect("event bus open");
    match finish {
        PlayerEvent::PlaybackFinish {
            unique_id,
            has_history,
            pause_requested,
            ..
        } => {
            assert_eq!(unique_id, Some(1));
            assert!(has_history);
            assert!(!pause_requested);
        }
        other => panic!("unexpected event {:?}", other),
    }

    let diagnostics = handle.diagnostics().await.unwrap();
    assert_eq!(diagnostics.state, PlayerState::Stopped);
    assert_eq!(diagnostics.play_requests, 0);
    assert!(diagnostics.current.is_none());

    handle.shutdown().await.unwrap();
    task.await.unwrap();
    assert!(handle.send(PlayerCommand::Play).await.is_err());
}

#[tokio::test]
async fn test_shutdown_restores_volume_through_handle() {
    let rig = Rig::new(quiet_settings(), Arc::new(InstantPreparer::default()));
    let volume = rig.volume.clone();
    let (handle, task) = spawn_engine(rig.engine);

    handle.send(PlayerCommand::SetVolume { volume: 30 }).await.unwrap();
    let diagnostics = handle.diagnostics().await.unwrap();
    assert_eq!(diagnostics.volume.user, 30);
    assert_eq!(volume.lock().unwrap().level, 30);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
    assert_eq!(volume.lock().unwrap().level, 50);
}

#[tokio::test]
async fn test_dropping_every_handle_stops_loop() {
    let rig = Rig::new(quiet_settings(), Arc::new(InstantPreparer::default()));
    let (handle, task) = spawn_engine(rig.engine);
    drop(handle);
    timeout(Duration::from_secs(5), task)
        .await
        .expect("loop exits")
        .unwrap();
}
