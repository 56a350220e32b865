use crate::error::EngineError;
use moot_core::model::{ParticipantId, WaitingParticipant};
use tokio::sync::oneshot;

/// UI-triggered actions entering the engine's serialized update path.
#[derive(Debug)]
pub enum EngineCommand {
    /// Mic mute / camera off toggles for the local participant.
    SetMediaState {
        mic_muted: bool,
        camera_off: bool,
    },

    /// Host action: promote a waiting participant into the roster.
    Admit {
        participant: WaitingParticipant,
    },

    /// Host action: remove a waiting participant without admitting.
    Deny {
        participant: ParticipantId,
    },

    SendChat {
        text: String,
    },

    /// Clear the unread-chat flag.
    AckChat,

    StartScreenShare {
        reply: oneshot::Sender<Result<(), EngineError>>,
    },

    StopScreenShare,

    /// Start co-watch of a locally loaded video.
    ShareMedia {
        name: String,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },

    StopMediaShare,

    /// Local player state change (play, pause or seek).
    PlaybackChanged {
        is_playing: bool,
        position: f64,
    },

    Leave,
}
