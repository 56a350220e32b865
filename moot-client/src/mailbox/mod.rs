mod memory;

pub use memory::MemoryMailbox;

use crate::error::MailboxError;
use async_trait::async_trait;
use moot_core::model::{
    CandidateDoc, ChatMessage, ConnectionDoc, MeetingDoc, MeetingId, ParticipantDoc,
    ParticipantId, SessionDescription, SharedMedia, WaitingParticipant,
};
use tokio::sync::mpsc;

/// `added`-change event from a connection's candidate collection. Candidate
/// documents are immutable, so added is the only change type surfaced.
#[derive(Debug, Clone)]
pub struct CandidateAdded {
    pub id: String,
    pub doc: CandidateDoc,
}

/// The signaling document store. Point writes use merge semantics; every
/// `watch_*` stream is a long-lived sequence of full authoritative snapshots
/// (candidates excepted, which arrive as discrete added events).
#[async_trait]
pub trait Mailbox: Send + Sync {
    async fn create_meeting(
        &self,
        meeting: &MeetingId,
        host: ParticipantDoc,
    ) -> Result<(), MailboxError>;

    async fn meeting_exists(&self, meeting: &MeetingId) -> Result<bool, MailboxError>;

    async fn put_participant(
        &self,
        meeting: &MeetingId,
        doc: ParticipantDoc,
    ) -> Result<(), MailboxError>;

    async fn remove_participant(
        &self,
        meeting: &MeetingId,
        id: &ParticipantId,
    ) -> Result<(), MailboxError>;

    async fn put_waiting(
        &self,
        meeting: &MeetingId,
        doc: WaitingParticipant,
    ) -> Result<(), MailboxError>;

    async fn remove_waiting(
        &self,
        meeting: &MeetingId,
        id: &ParticipantId,
    ) -> Result<(), MailboxError>;

    /// Merge-write the `sharedMedia` field of the meeting document.
    /// `None` clears the active share.
    async fn set_shared_media(
        &self,
        meeting: &MeetingId,
        media: Option<SharedMedia>,
    ) -> Result<(), MailboxError>;

    /// Create the pair's connection document if absent.
    async fn ensure_connection(
        &self,
        meeting: &MeetingId,
        pair: &str,
        participants: [ParticipantId; 2],
    ) -> Result<(), MailboxError>;

    async fn write_offer(
        &self,
        meeting: &MeetingId,
        pair: &str,
        offer: SessionDescription,
        by: ParticipantId,
    ) -> Result<(), MailboxError>;

    async fn write_answer(
        &self,
        meeting: &MeetingId,
        pair: &str,
        answer: SessionDescription,
        by: ParticipantId,
    ) -> Result<(), MailboxError>;

    /// Append a candidate document; returns the assigned auto-id.
    async fn add_candidate(
        &self,
        meeting: &MeetingId,
        pair: &str,
        doc: CandidateDoc,
    ) -> Result<String, MailboxError>;

    async fn append_chat(
        &self,
        meeting: &MeetingId,
        message: ChatMessage,
    ) -> Result<(), MailboxError>;

    fn watch_roster(&self, meeting: &MeetingId) -> mpsc::Receiver<Vec<ParticipantDoc>>;

    fn watch_waiting(&self, meeting: &MeetingId) -> mpsc::Receiver<Vec<WaitingParticipant>>;

    fn watch_meeting(&self, meeting: &MeetingId) -> mpsc::Receiver<MeetingDoc>;

    /// Chat snapshots ordered by timestamp ascending.
    fn watch_chat(&self, meeting: &MeetingId) -> mpsc::Receiver<Vec<ChatMessage>>;

    fn watch_connection(&self, meeting: &MeetingId, pair: &str) -> mpsc::Receiver<ConnectionDoc>;

    fn watch_candidates(&self, meeting: &MeetingId, pair: &str) -> mpsc::Receiver<CandidateAdded>;
}
