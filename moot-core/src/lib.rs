pub mod model;

pub use model::{MeetingId, ParticipantId};
