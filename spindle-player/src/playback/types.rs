//! Playback item types

use serde::Serialize;
use spindle_common::commands::{ItemKind, PrepareRequest, SourceKind};

/// An item being prepared, prepared, or playing
///
/// Owned by the prep queue until claimed or cleared; the engine owns the
/// claimed copy for as long as it is the current item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrepItem {
    pub unique_id: i64,
    pub source_ref: String,
    /// Playable local reference, empty until prepared
    pub local_ref: String,
    /// Duration, normalized for speed. Values <= 1 mean "ask the backend".
    pub duration_ms: i64,
    /// Start offset, normalized for speed
    pub start_offset_ms: i64,
    pub speed_percent: i32,
    pub volume_adjust_percent: f64,
    pub kind: ItemKind,
    pub source_kind: SourceKind,
}

impl PrepItem {
    pub fn is_announcement(&self) -> bool {
        self.kind == ItemKind::Announcement
    }

    pub fn is_prepared(&self) -> bool {
        !self.local_ref.is_empty()
    }

    /// Tracks match on id alone; announcements must also match the source
    pub fn matches(&self, unique_id: i64, source_ref: &str) -> bool {
        self.unique_id == unique_id
            && (self.kind == ItemKind::Track || self.source_ref == source_ref)
    }

    /// True when preparing `other` supersedes this item
    ///
    /// Announcements share ids, so two of them only collide on the same
    /// source.
    pub fn same_slot(&self, other: &PrepItem) -> bool {
        self.unique_id == other.unique_id
            && (!(self.is_announcement() && other.is_announcement())
                || self.source_ref == other.source_ref)
    }

    /// Fully-qualified reference handed to the backend for network sources
    pub fn full_ref(&self) -> Option<&str> {
        match self.source_kind {
            SourceKind::Network => Some(self.source_ref.as_str()),
            SourceKind::LocalFile => None,
        }
    }
}

impl From<PrepareRequest> for PrepItem {
    fn from(req: PrepareRequest) -> Self {
        Self {
            unique_id: req.unique_id,
            source_ref: req.source_ref,
            local_ref: String::new(),
            duration_ms: req.duration_ms,
            start_offset_ms: req.start_offset_ms.max(0),
            speed_percent: if req.speed_percent > 0 { req.speed_percent } else { 100 },
            volume_adjust_percent: req.volume_adjust_percent,
            kind: req.kind,
            source_kind: req.source_kind,
        }
    }
}

/// "Play this prepared item" request from the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayRequest {
    pub unique_id: i64,
    pub source_ref: String,
}

impl PlayRequest {
    pub fn new(unique_id: i64, source_ref: impl Into<String>) -> Self {
        Self {
            unique_id,
            source_ref: source_ref.into(),
        }
    }
}
