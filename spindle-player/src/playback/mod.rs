//! Playback engine, queues and volume handling

pub mod engine;
pub mod fader;
pub mod prep_queue;
pub mod request_queue;
pub mod types;
pub mod volume;

pub use engine::{spawn_engine, Backends, EngineHandle, EngineSettings, PlaybackEngine};
pub use prep_queue::PrepQueue;
pub use request_queue::PlayRequestQueue;
pub use types::{PlayRequest, PrepItem};
pub use volume::VolumeController;
