use async_trait::async_trait;
use moot_client::error::LinkError;
use moot_client::link::{LinkEvent, LinkEventKind, LinkFactory, LinkState, PeerLink};
use moot_client::media::LocalTrack;
use moot_core::model::{
    CandidatePayload, ParticipantId, QualityHint, RemoteStream, SessionDescription, TrackKind,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// How many local candidates a fake link trickles after producing a
/// description.
pub const FAKE_CANDIDATES: usize = 2;

#[derive(Default)]
struct FakeLinkInner {
    local_description: Option<SessionDescription>,
    remote_description: Option<SessionDescription>,
    outgoing: HashMap<TrackKind, LocalTrack>,
    outgoing_history: Vec<(TrackKind, String)>,
    aux_audio: Option<LocalTrack>,
    applied_candidates: Vec<String>,
    quality_hints: Vec<(TrackKind, QualityHint)>,
    close_calls: usize,
}

/// In-process stand-in for a peer connection that records everything the
/// engine does to it. Descriptions are opaque strings; once both sides are
/// set the link reports `Connected`. After producing a description it
/// trickles a fixed number of local candidates, so candidate publication
/// and queueing get exercised end to end.
pub struct FakeLink {
    peer: ParticipantId,
    events: mpsc::Sender<LinkEvent>,
    inner: Mutex<FakeLinkInner>,
}

impl FakeLink {
    pub fn new(peer: ParticipantId, events: mpsc::Sender<LinkEvent>) -> Self {
        Self {
            peer,
            events,
            inner: Mutex::new(FakeLinkInner::default()),
        }
    }

    pub fn outgoing(&self, kind: TrackKind) -> Option<LocalTrack> {
        self.inner.lock().unwrap().outgoing.get(&kind).cloned()
    }

    /// Every track id that ever occupied a slot, in order.
    pub fn outgoing_history(&self) -> Vec<(TrackKind, String)> {
        self.inner.lock().unwrap().outgoing_history.clone()
    }

    pub fn aux_audio(&self) -> Option<LocalTrack> {
        self.inner.lock().unwrap().aux_audio.clone()
    }

    pub fn applied_candidates(&self) -> Vec<String> {
        self.inner.lock().unwrap().applied_candidates.clone()
    }

    pub fn quality_hints(&self) -> Vec<(TrackKind, QualityHint)> {
        self.inner.lock().unwrap().quality_hints.clone()
    }

    pub fn close_calls(&self) -> usize {
        self.inner.lock().unwrap().close_calls
    }

    pub fn local_description(&self) -> Option<SessionDescription> {
        self.inner.lock().unwrap().local_description.clone()
    }

    pub fn has_both_descriptions(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.local_description.is_some() && inner.remote_description.is_some()
    }

    pub async fn emit_state(&self, state: LinkState) {
        self.emit(LinkEventKind::StateChanged(state)).await;
    }

    pub async fn emit_remote_stream(&self, id: &str) {
        self.emit(LinkEventKind::RemoteStream(RemoteStream { id: id.to_owned() }))
            .await;
    }

    async fn emit(&self, kind: LinkEventKind) {
        let _ = self
            .events
            .send(LinkEvent::new(self.peer.clone(), kind))
            .await;
    }

    async fn trickle_candidates(&self) {
        for n in 0..FAKE_CANDIDATES {
            self.emit(LinkEventKind::LocalCandidate(CandidatePayload {
                candidate: format!("candidate:{}:{n}", self.peer),
                ..Default::default()
            }))
            .await;
        }
    }

    async fn connected_if_ready(&self) {
        if self.has_both_descriptions() {
            self.emit_state(LinkState::Connected).await;
        }
    }
}

#[async_trait]
impl PeerLink for FakeLink {
    async fn create_offer(&self) -> Result<SessionDescription, LinkError> {
        let offer = SessionDescription::offer(format!("offer-for-{}", self.peer));
        self.inner.lock().unwrap().local_description = Some(offer.clone());
        self.trickle_candidates().await;
        Ok(offer)
    }

    async fn accept_offer(
        &self,
        offer: SessionDescription,
    ) -> Result<SessionDescription, LinkError> {
        let answer = SessionDescription::answer(format!("answer-for-{}", self.peer));
        {
            let mut inner = self.inner.lock().unwrap();
            inner.remote_description = Some(offer);
            inner.local_description = Some(answer.clone());
        }
        self.trickle_candidates().await;
        self.connected_if_ready().await;
        Ok(answer)
    }

    async fn accept_answer(&self, answer: SessionDescription) -> Result<(), LinkError> {
        self.inner.lock().unwrap().remote_description = Some(answer);
        self.connected_if_ready().await;
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: CandidatePayload) -> Result<(), LinkError> {
        self.inner
            .lock()
            .unwrap()
            .applied_candidates
            .push(candidate.candidate);
        Ok(())
    }

    async fn set_outgoing(&self, kind: TrackKind, track: LocalTrack) -> Result<(), LinkError> {
        let mut inner = self.inner.lock().unwrap();
        inner.outgoing_history.push((kind, track.id().to_owned()));
        inner.outgoing.insert(kind, track);
        Ok(())
    }

    async fn clear_outgoing(&self, kind: TrackKind) -> Result<(), LinkError> {
        self.inner.lock().unwrap().outgoing.remove(&kind);
        Ok(())
    }

    async fn add_aux_audio(&self, track: LocalTrack) -> Result<(), LinkError> {
        self.inner.lock().unwrap().aux_audio = Some(track);
        Ok(())
    }

    async fn remove_aux_audio(&self) -> Result<(), LinkError> {
        self.inner.lock().unwrap().aux_audio = None;
        Ok(())
    }

    async fn request_quality(&self, kind: TrackKind, hint: QualityHint) -> Result<(), LinkError> {
        self.inner.lock().unwrap().quality_hints.push((kind, hint));
        Ok(())
    }

    async fn close(&self) -> Result<(), LinkError> {
        self.inner.lock().unwrap().close_calls += 1;
        Ok(())
    }
}

/// Factory that keeps every link it opened so tests can inspect them.
#[derive(Default)]
pub struct FakeLinkFactory {
    links: Mutex<Vec<(ParticipantId, Arc<FakeLink>)>>,
}

impl FakeLinkFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn link_to(&self, peer: &ParticipantId) -> Option<Arc<FakeLink>> {
        self.links
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(id, _)| id == peer)
            .map(|(_, link)| link.clone())
    }

    pub fn opened(&self) -> usize {
        self.links.lock().unwrap().len()
    }
}

#[async_trait]
impl LinkFactory for FakeLinkFactory {
    async fn open(
        &self,
        peer: ParticipantId,
        events: mpsc::Sender<LinkEvent>,
    ) -> Result<Arc<dyn PeerLink>, LinkError> {
        let link = Arc::new(FakeLink::new(peer.clone(), events));
        self.links.lock().unwrap().push((peer, link.clone()));
        Ok(link)
    }
}
