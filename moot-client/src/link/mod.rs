mod rtc;

pub use rtc::{RtcLinkFactory, RtcPeerLink};

use crate::error::LinkError;
use crate::media::LocalTrack;
use async_trait::async_trait;
use moot_core::model::{
    CandidatePayload, ParticipantId, QualityHint, RemoteStream, SessionDescription, TrackKind,
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Transport-level connection state as observed by the engine. Terminal
/// states trigger session teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl LinkState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LinkState::Disconnected | LinkState::Failed | LinkState::Closed
        )
    }
}

#[derive(Debug, Clone)]
pub enum LinkEventKind {
    StateChanged(LinkState),
    RemoteStream(RemoteStream),
    LocalCandidate(CandidatePayload),
}

/// Asynchronous completion funneled from a peer link into the engine loop.
#[derive(Debug, Clone)]
pub struct LinkEvent {
    pub peer: ParticipantId,
    pub kind: LinkEventKind,
}

impl LinkEvent {
    pub fn new(peer: ParticipantId, kind: LinkEventKind) -> Self {
        Self { peer, kind }
    }
}

/// One peer connection. Outgoing media occupies at most one sender per
/// kind (`set_outgoing` replaces in place, never duplicates) plus at most
/// one auxiliary audio sender for share audio.
#[async_trait]
pub trait PeerLink: Send + Sync {
    /// Produce and install the local offer.
    async fn create_offer(&self) -> Result<SessionDescription, LinkError>;

    /// Apply a remote offer and produce the local answer.
    async fn accept_offer(&self, offer: SessionDescription)
        -> Result<SessionDescription, LinkError>;

    /// Apply the remote answer.
    async fn accept_answer(&self, answer: SessionDescription) -> Result<(), LinkError>;

    async fn add_remote_candidate(&self, candidate: CandidatePayload) -> Result<(), LinkError>;

    /// Route `track` into the outgoing slot of its kind: replace the
    /// existing sender's track, or add exactly one sender if none exists.
    async fn set_outgoing(&self, kind: TrackKind, track: LocalTrack) -> Result<(), LinkError>;

    /// Leave the sender in place but send nothing for this kind.
    async fn clear_outgoing(&self, kind: TrackKind) -> Result<(), LinkError>;

    /// Add the share's auxiliary audio sender. The link retains the handle
    /// so `remove_aux_audio` can detach it later.
    async fn add_aux_audio(&self, track: LocalTrack) -> Result<(), LinkError>;

    async fn remove_aux_audio(&self) -> Result<(), LinkError>;

    /// Best-effort sender quality request (co-watch bitrate/priority).
    async fn request_quality(&self, kind: TrackKind, hint: QualityHint) -> Result<(), LinkError>;

    /// Close the underlying connection. Idempotent.
    async fn close(&self) -> Result<(), LinkError>;
}

/// Creates peer links wired to the engine's event channel.
#[async_trait]
pub trait LinkFactory: Send + Sync {
    async fn open(
        &self,
        peer: ParticipantId,
        events: mpsc::Sender<LinkEvent>,
    ) -> Result<Arc<dyn PeerLink>, LinkError>;
}
