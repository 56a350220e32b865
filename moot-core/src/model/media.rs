use crate::model::participant::ParticipantId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Screen,
}

/// Last-write-wins playback record nested in the shared-media document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub is_playing: bool,
    /// Seconds from the start of the shared video.
    pub position: f64,
    /// Unix millis at the broadcaster when this record was written.
    pub updated_at: u64,
}

/// The meeting's single active share descriptor (`sharedMedia` field of the
/// meeting document). Last full-document write wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SharedMedia {
    pub sharer_id: ParticipantId,
    pub sharer_name: String,
    pub kind: MediaKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playback: Option<PlaybackState>,
}

/// Best-effort sender quality request used for co-watch video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityHint {
    pub max_bitrate: u64,
    pub high_priority: bool,
}

impl QualityHint {
    /// Parameters the co-watch router asks for on the shared video sender.
    pub fn co_watch() -> Self {
        Self {
            max_bitrate: 50_000_000,
            high_priority: true,
        }
    }
}
