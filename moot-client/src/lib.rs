pub mod config;
pub mod engine;
pub mod error;
pub mod link;
pub mod mailbox;
pub mod media;
pub mod session;
pub mod time;

pub use config::IceConfig;
pub use engine::{MeetingClient, MeetingHandle, MeetingState, PlaybackDirective};
pub use error::{EngineError, LinkError, MailboxError, MediaError};
