use crate::link::LinkEvent;
use crate::mailbox::CandidateAdded;
use moot_core::model::{
    ChatMessage, ConnectionDoc, MeetingDoc, ParticipantDoc, ParticipantId, WaitingParticipant,
};

/// Everything that can reach the engine loop besides a command: mailbox
/// snapshots and peer-link completions, funneled through one channel so no
/// two mutations of meeting state ever interleave.
#[derive(Debug)]
pub enum EngineEvent {
    Roster(Vec<ParticipantDoc>),
    Waiting(Vec<WaitingParticipant>),
    Meeting(MeetingDoc),
    Chat(Vec<ChatMessage>),
    Connection {
        peer: ParticipantId,
        doc: ConnectionDoc,
    },
    Candidate {
        peer: ParticipantId,
        added: CandidateAdded,
    },
    Link(LinkEvent),
    /// The platform ended the display capture (user hit "stop sharing").
    CaptureEnded,
}
