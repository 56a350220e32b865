mod command;
mod engine;
mod event;
mod handle;
mod router;
mod state;
mod sync;

pub use command::EngineCommand;
pub use engine::MeetingEngine;
pub use event::EngineEvent;
pub use handle::{MeetingClient, MeetingHandle};
pub use router::{ShareKind, TrackRouter};
pub use state::MeetingState;
pub use sync::{DRIFT_SECONDS, ECHO_SUPPRESS, PlaybackDirective, PlaybackSync, STALE_AFTER_MS};
