use crate::session::SessionPhase;
use moot_core::model::{
    ChatMessage, MeetingDoc, MeetingId, Participant, ParticipantDoc, ParticipantId,
    PlaybackState, RemoteStream, SharedMedia, WaitingParticipant,
};
use std::collections::BTreeMap;

/// The aggregated meeting view: four independent mailbox feeds reconciled
/// into one tree. All mutation goes through the appliers below, which run
/// only on the engine loop.
#[derive(Debug, Clone)]
pub struct MeetingState {
    pub meeting_id: MeetingId,
    pub local_id: ParticipantId,
    pub local_name: String,
    pub is_host: bool,
    pub host_id: Option<ParticipantId>,
    pub participants: Vec<Participant>,
    pub waiting: Vec<WaitingParticipant>,
    pub shared_media: Option<SharedMedia>,
    pub current_sharer: Option<ParticipantId>,
    pub chat: Vec<ChatMessage>,
    pub unread_chat: bool,
    pub is_mic_muted: bool,
    pub is_camera_off: bool,
    pub is_screen_sharing: bool,
    pub media_error: Option<String>,
    pub session_phases: BTreeMap<ParticipantId, SessionPhase>,
    pub left: bool,
}

impl MeetingState {
    pub fn new(
        meeting_id: MeetingId,
        local_id: ParticipantId,
        local_name: String,
        is_host: bool,
    ) -> Self {
        Self {
            meeting_id,
            local_id,
            local_name,
            is_host,
            host_id: None,
            participants: Vec::new(),
            waiting: Vec::new(),
            shared_media: None,
            current_sharer: None,
            chat: Vec::new(),
            unread_chat: false,
            is_mic_muted: false,
            is_camera_off: false,
            is_screen_sharing: false,
            media_error: None,
            session_phases: BTreeMap::new(),
            left: false,
        }
    }

    /// The local participant appears in the roster once admitted.
    pub fn is_admitted(&self) -> bool {
        self.participants.iter().any(|p| p.id == self.local_id)
    }

    pub fn participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == *id)
    }

    /// Roster stream: wholesale replace. Stream references and media-state
    /// flags are engine-owned, so they carry over for ids that survive the
    /// snapshot; the local entry reflects the local flags.
    pub fn apply_roster(&mut self, docs: Vec<ParticipantDoc>) {
        let previous = std::mem::take(&mut self.participants);
        self.participants = docs
            .into_iter()
            .map(|doc| {
                let mut p = Participant::from_doc(doc);
                if p.id == self.local_id {
                    p.is_mic_muted = self.is_mic_muted;
                    p.is_camera_off = self.is_camera_off;
                } else if let Some(old) = previous.iter().find(|old| old.id == p.id) {
                    p.is_mic_muted = old.is_mic_muted;
                    p.is_camera_off = old.is_camera_off;
                    p.stream = old.stream.clone();
                }
                p
            })
            .collect();
        self.prune_waiting();
    }

    /// Waiting-room stream: wholesale replace, then the promotion-race rule.
    pub fn apply_waiting(&mut self, docs: Vec<WaitingParticipant>) {
        self.waiting = docs;
        self.prune_waiting();
    }

    /// A participant is never simultaneously in the roster and the waiting
    /// set; the roster wins however the two snapshots interleave.
    fn prune_waiting(&mut self) {
        self.waiting
            .retain(|w| !self.participants.iter().any(|p| p.id == w.id));
    }

    /// Meeting-document stream. A remote shared-media value authored by the
    /// local participant is a stale echo of our own in-flight write and is
    /// skipped; everything else replaces wholesale. Returns the playback
    /// record to feed the follower side of the synchronizer, if any.
    pub fn apply_meeting(&mut self, doc: MeetingDoc) -> Option<PlaybackState> {
        self.host_id = Some(doc.host_id);

        let remote = doc.shared_media;
        self.current_sharer = remote.as_ref().map(|m| m.sharer_id.clone());

        let locally_authored = remote
            .as_ref()
            .is_some_and(|m| m.sharer_id == self.local_id);
        if locally_authored {
            return None;
        }

        let playback = remote.as_ref().and_then(|m| m.playback);
        self.shared_media = remote;
        playback
    }

    /// Chat stream: append-only merge ordered by timestamp ascending,
    /// idempotent on message ids. Growth sets the unread flag.
    pub fn apply_chat(&mut self, incoming: Vec<ChatMessage>) {
        let before = self.chat.len();
        let mut merged = incoming;
        for msg in &self.chat {
            if !merged.iter().any(|m| m.id == msg.id) {
                merged.push(msg.clone());
            }
        }
        merged.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        merged.dedup_by(|a, b| a.id == b.id);
        self.chat = merged;
        if self.chat.len() > before {
            self.unread_chat = true;
        }
    }

    /// Optimistic local append before the mailbox echo arrives. Does not
    /// raise the unread flag; that is for messages from others.
    pub fn add_local_chat(&mut self, message: ChatMessage) {
        if !self.chat.iter().any(|m| m.id == message.id) {
            self.chat.push(message);
        }
    }

    pub fn set_participant_stream(&mut self, id: &ParticipantId, stream: Option<RemoteStream>) {
        if let Some(p) = self.participants.iter_mut().find(|p| p.id == *id) {
            p.stream = stream;
        }
    }

    pub fn set_local_media_flags(&mut self, mic_muted: bool, camera_off: bool) {
        self.is_mic_muted = mic_muted;
        self.is_camera_off = camera_off;
        let local_id = self.local_id.clone();
        if let Some(p) = self.participants.iter_mut().find(|p| p.id == local_id) {
            p.is_mic_muted = mic_muted;
            p.is_camera_off = camera_off;
        }
    }

    /// Optimistic application of a locally initiated share or playback
    /// update, ahead of the remote echo.
    pub fn set_local_share(&mut self, media: Option<SharedMedia>) {
        self.current_sharer = media.as_ref().map(|m| m.sharer_id.clone());
        self.shared_media = media;
    }
}
