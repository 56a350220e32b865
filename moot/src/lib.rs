pub use moot_core::model::{MeetingId, ParticipantId};

pub mod model {
    pub use moot_core::model::*;
}

pub mod client {
    pub use moot_client::*;
}

pub use moot_client::{IceConfig, MeetingClient, MeetingHandle, MeetingState, PlaybackDirective};
