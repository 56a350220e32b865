mod chat;
mod media;
mod meeting;
mod participant;
mod signaling;

pub use chat::ChatMessage;
pub use media::{MediaKind, PlaybackState, QualityHint, SharedMedia, TrackKind};
pub use meeting::{MeetingDoc, MeetingId};
pub use participant::{Participant, ParticipantDoc, ParticipantId, RemoteStream, WaitingParticipant};
pub use signaling::{
    CandidateDoc, CandidatePayload, ConnectionDoc, IceServerConfig, NegotiationRole, SdpKind,
    SessionDescription, pair_key,
};
